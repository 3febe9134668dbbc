pub mod round_ticker;
