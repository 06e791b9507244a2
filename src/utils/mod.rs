pub(crate) mod backoff;
