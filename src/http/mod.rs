pub mod hint_endpoint;
pub mod mutator;
pub mod reassembler;
