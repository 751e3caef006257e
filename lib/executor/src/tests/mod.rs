mod root_types;
mod scenario;
mod testkit;
