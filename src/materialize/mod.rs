mod cast;
mod materializer;

pub use materializer::ResultMaterializer;
