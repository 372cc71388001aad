pub(crate) mod effects;
