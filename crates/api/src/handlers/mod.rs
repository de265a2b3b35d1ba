pub mod admin;
pub mod audit;
pub mod numbers;
pub mod payments;
pub mod subscriptions;
pub mod users;
