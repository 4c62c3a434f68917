/// Administrative domain registration record routes.
pub(crate) mod domains;

/// Project, deployment and provider-side domain routes.
pub(crate) mod projects;
