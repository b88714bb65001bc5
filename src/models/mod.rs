pub mod candle;
pub mod timeframe;
