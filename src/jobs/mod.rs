pub mod listing_expiry;
