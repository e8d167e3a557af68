pub mod token_domain;

pub use token_domain::TokenDomainService;
