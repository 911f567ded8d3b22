/*!
Generate fake daily market data, for testing purposes
*/
use super::OhlcvRecord;
use crate::error::{Error, Result};
use chrono::{Duration, NaiveDate};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// A trait implemented by price generators
pub trait PriceGen {
    /// Generate the next day's closing price
    fn next_price(&mut self) -> f64;
}

/// Generate fake prices using a geometric random walk
#[derive(Debug, Copy, Clone)]
pub struct PriceRandomWalk<R> {
    /// The RNG used by this random walk
    pub rng: R,
    /// The current price
    pub price: f64,
    /// The distribution of daily log returns
    pub returns: Normal<f64>,
}

impl<R: Rng> PriceGen for PriceRandomWalk<R> {
    fn next_price(&mut self) -> f64 {
        let ret = self.returns.sample(&mut self.rng);
        self.price *= ret.exp();
        self.price
    }
}

/// Generate daily records from a price generator, one per calendar day
#[derive(Debug, Clone)]
pub struct DailyGen<R, P> {
    /// The date of the next record
    pub date: NaiveDate,
    /// The price generator in use
    pub price_gen: P,
    /// The RNG used for intraday ranges and volume
    pub rng: R,
    /// The average daily volume
    pub volume: f64,
}

impl<R: Rng, P: PriceGen> Iterator for DailyGen<R, P> {
    type Item = OhlcvRecord;
    fn next(&mut self) -> Option<OhlcvRecord> {
        let open = self.price_gen.next_price();
        let close = self.price_gen.next_price();
        let spread = (close - open).abs() * self.rng.gen_range(0.0, 0.5);
        let record = OhlcvRecord {
            date: self.date,
            open,
            high: open.max(close) + spread,
            low: (open.min(close) - spread).max(0.0),
            close,
            volume: self.volume * self.rng.gen_range(0.5, 1.5),
        };
        self.date = self.date + Duration::days(1);
        Some(record)
    }
}

/// A daily random walk starting at `price` on `start`, with daily log-return volatility `sigma`.
///
/// Intraday ranges and volume draw from a second generator seeded from `rng`.
pub fn random_walk<R: Rng + SeedableRng>(
    mut rng: R,
    start: NaiveDate,
    price: f64,
    sigma: f64,
) -> Result<DailyGen<R, PriceRandomWalk<R>>> {
    let returns = Normal::new(0.0, sigma)
        .map_err(|err| Error::InvalidParameter(format!("volatility {}: {:?}", sigma, err)))?;
    let daily_rng = R::from_rng(&mut rng)
        .map_err(|err| Error::InvalidParameter(format!("cannot seed generator: {}", err)))?;
    Ok(DailyGen {
        date: start,
        price_gen: PriceRandomWalk {
            rng,
            price,
            returns,
        },
        rng: daily_rng,
        volume: 1e6,
    })
}
