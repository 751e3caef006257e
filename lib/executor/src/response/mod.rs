pub mod error_normalization;
pub mod graphql_error;
pub mod merge;
pub mod null_bubbling;
pub mod response;
pub mod subgraph_response;
