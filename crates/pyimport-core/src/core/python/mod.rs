pub(crate) mod python_sys;
