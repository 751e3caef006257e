mod root_types;
mod testkit;
