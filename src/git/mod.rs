pub mod repo;

pub use repo::LocalRepo;
