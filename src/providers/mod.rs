pub mod yahoo;

pub use yahoo::YahooProvider;
