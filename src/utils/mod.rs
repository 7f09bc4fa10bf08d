pub(crate) mod dns;
pub(crate) mod patterns;
pub(crate) mod policy;
pub(crate) mod scrape;
pub(crate) mod smtp;
