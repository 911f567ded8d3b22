/*!
CSV market data files, as exported by common market data tools
*/
use super::{normalize_column, Column, MarketDataSource, OhlcvRecord};
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// The date format of the first column
pub const CSV_DATE: &str = "%Y-%m-%d";

/// Parse the date at the start of a field, ignoring any trailing time of day
fn parse_date(field: &str) -> Option<NaiveDate> {
    let field = field.trim();
    NaiveDate::parse_from_str(field.get(..10).unwrap_or(field), CSV_DATE).ok()
}

/// Read daily records from a Reader.
///
/// The first column holds the date; the others are named by the header row and normalized with
/// `normalize_column`, so unknown and adjusted close columns are ignored. Rows whose first field
/// is not a date, such as the extra header rows of multi-level exports, are skipped. Unparseable
/// values are `NaN`. Rows which cannot be read at all, such as invalid UTF-8, are an error.
pub fn read_ohlcv<R: Read>(rdr: R) -> Result<Vec<OhlcvRecord>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);
    let columns: Vec<Option<Column>> = rdr
        .headers()?
        .iter()
        .skip(1)
        .map(normalize_column)
        .collect();
    let mut records = Vec::new();
    for result in rdr.into_records() {
        let record = result?;
        let mut fields = record.iter();
        let date = match fields.next().and_then(parse_date) {
            Some(date) => date,
            None => continue,
        };
        let mut ohlcv = OhlcvRecord::missing(date);
        for (column, field) in columns.iter().zip(fields) {
            if let Some(column) = column {
                ohlcv.set(*column, f64::from_str(field.trim()).unwrap_or(f64::NAN));
            }
        }
        records.push(ohlcv);
    }
    records.sort_by_key(|record| record.date);
    Ok(records)
}

/// Write daily records to a Writer
/// On success, return how many records were written
pub fn write_ohlcv<W, I>(wtr: W, records: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = OhlcvRecord>,
{
    let mut wtr = csv::Writer::from_writer(wtr);
    let mut written = 0;
    for record in records {
        wtr.serialize(record)?;
        written += 1;
    }
    wtr.flush()?;
    Ok(written)
}

/// Market data read from `<ticker>.csv` files in a directory
#[derive(Debug, Clone)]
pub struct CsvMarketData {
    dir: PathBuf,
}

impl CsvMarketData {
    /// Read files from a directory
    pub fn new(dir: impl Into<PathBuf>) -> CsvMarketData {
        CsvMarketData { dir: dir.into() }
    }
    /// The file holding a ticker's data
    pub fn path(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", ticker))
    }
    /// Read every record of a ticker. A missing file has no records.
    pub fn read_all(&self, ticker: &str) -> Result<Vec<OhlcvRecord>> {
        let path = self.path(ticker);
        if !Path::exists(&path) {
            debug!(ticker, path = %path.display(), "no market data file");
            return Ok(Vec::new());
        }
        read_ohlcv(File::open(path)?)
    }
}

#[async_trait]
impl MarketDataSource for CsvMarketData {
    async fn fetch_daily(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<OhlcvRecord>> {
        let mut records = self.read_all(ticker)?;
        records.retain(|record| record.date >= start && record.date <= end);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_multi_level_export() {
        let text = "\
Price,Adj Close,Close,High,Low,Open,Volume
Ticker,BTC-USD,BTC-USD,BTC-USD,BTC-USD,BTC-USD,BTC-USD
Date,,,,,,
2024-01-02 00:00:00+00:00,45.5,45.0,46.0,44.0,44.5,1000
2024-01-01 00:00:00+00:00,44.0,44.5,45.0,43.0,43.5,900
";
        let records = read_ohlcv(text.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(records[0].close, 44.5);
        assert_eq!(records[1].open, 44.5);
        assert_eq!(records[1].volume, 1000.0);
    }

    #[test]
    fn missing_values_are_nan() {
        let text = "Date,Open,High,Low,Close,Volume\n2024-01-01,1,2,0.5,,10\n";
        let records = read_ohlcv(text.as_bytes()).unwrap();
        assert!(records[0].close.is_nan());
        assert!(!records[0].is_complete());
    }

    #[test]
    fn unreadable_rows_are_errors() {
        let mut bytes = b"Date,Open,High,Low,Close,Volume\n2024-01-01,1,2,0.5,1.5,10\n".to_vec();
        bytes.extend_from_slice(b"2024-01-02,1,2,0.5,\xff\xfe,10\n");
        bytes.extend_from_slice(b"2024-01-03,1,2,0.5,1.5,10\n");
        assert!(matches!(
            read_ohlcv(&bytes[..]),
            Err(crate::error::Error::Csv(_))
        ));
    }

    #[test]
    fn written_files_read_back() {
        let record = OhlcvRecord {
            date: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 1e9,
        };
        let mut buf = Vec::new();
        assert_eq!(write_ohlcv(&mut buf, vec![record]).unwrap(), 1);
        assert_eq!(read_ohlcv(&buf[..]).unwrap(), vec![record]);
    }
}
