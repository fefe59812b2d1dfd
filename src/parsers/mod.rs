pub mod chrome_history;
