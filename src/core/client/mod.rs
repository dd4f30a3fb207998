// HTTP capability used to reach the analytics service
pub mod fetcher;
pub mod reqwest_fetcher;
