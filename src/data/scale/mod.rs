/*!
Input data scaling

Scalers are fit once, on the training partition, and then only ever applied. Values outside the
fitted range are *not* clipped: they map outside of `[0, 1]`.
*/
use crate::error::{Error, Result};
use crate::CpuFloat;
use itertools::{Itertools, MinMaxResult};
use num::Float;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// The format tag written into persisted scalers
pub const SCALER_FORMAT: &str = "minmax";

/// The current persisted scaler version
pub const SCALER_VERSION: u32 = 1;

/// A per-dimension min-max scaler mapping the observed `[min, max]` onto `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxScaler<F = CpuFloat> {
    /// The minimum observed value of each dimension
    pub min: Vec<F>,
    /// The maximum observed value of each dimension
    pub max: Vec<F>,
}

impl<F> MinMaxScaler<F>
where
    F: Float,
{
    /// Fit a scaler on rows of `dims` values each.
    ///
    /// Non-finite values are ignored. A dimension with no finite values gets the range `[0, 0]`.
    pub fn fit<I, R>(rows: I, dims: usize) -> MinMaxScaler<F>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[F]>,
    {
        let rows: Vec<R> = rows.into_iter().collect();
        let mut min = Vec::with_capacity(dims);
        let mut max = Vec::with_capacity(dims);
        for dim in 0..dims {
            let column = rows
                .iter()
                .filter_map(|row| row.as_ref().get(dim).copied())
                .filter(|value| value.is_finite())
                .minmax_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let (lo, hi) = match column {
                MinMaxResult::NoElements => (F::zero(), F::zero()),
                MinMaxResult::OneElement(value) => (value, value),
                MinMaxResult::MinMax(lo, hi) => (lo, hi),
            };
            min.push(lo);
            max.push(hi);
        }
        MinMaxScaler { min, max }
    }
    /// Fit a single-dimension scaler
    pub fn fit_column(values: &[F]) -> MinMaxScaler<F> {
        Self::fit(values.iter().map(std::slice::from_ref), 1)
    }
    /// The number of dimensions this scaler handles
    #[inline]
    pub fn dims(&self) -> usize {
        self.min.len()
    }
    /// The scale of a dimension. A constant dimension has scale one, so it maps to zero.
    #[inline]
    fn range(&self, dim: usize) -> F {
        let range = self.max[dim] - self.min[dim];
        if range == F::zero() {
            F::one()
        } else {
            range
        }
    }
    /// Scale a single value of a given dimension
    #[inline]
    pub fn scale_value(&self, dim: usize, value: F) -> F {
        (value - self.min[dim]) / self.range(dim)
    }
    /// Undo the scaling of a single value of a given dimension
    #[inline]
    pub fn unscale_value(&self, dim: usize, value: F) -> F {
        value * self.range(dim) + self.min[dim]
    }
    /// Scale a row of values in place
    pub fn transform_in_place(&self, row: &mut [F]) -> Result<()> {
        self.check_dims(row.len())?;
        for (dim, value) in row.iter_mut().enumerate() {
            *value = self.scale_value(dim, *value);
        }
        Ok(())
    }
    /// Scale a row of values
    pub fn transform(&self, row: &[F]) -> Result<Vec<F>> {
        let mut row = row.to_vec();
        self.transform_in_place(&mut row)?;
        Ok(row)
    }
    /// Undo the scaling of a row of values
    pub fn inverse_transform(&self, row: &[F]) -> Result<Vec<F>> {
        self.check_dims(row.len())?;
        Ok(row
            .iter()
            .enumerate()
            .map(|(dim, value)| self.unscale_value(dim, *value))
            .collect())
    }
    fn check_dims(&self, len: usize) -> Result<()> {
        if len == self.dims() {
            Ok(())
        } else {
            Err(Error::ArtifactFormat(format!(
                "scaler fit on {} dimensions applied to {}",
                self.dims(),
                len
            )))
        }
    }
}

/// The persisted form of a scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerRecord {
    /// Always `SCALER_FORMAT`
    pub format: String,
    /// The version this record was written with
    pub version: u32,
    /// Per-dimension minima
    pub min: Vec<f64>,
    /// Per-dimension maxima
    pub max: Vec<f64>,
}

impl From<&MinMaxScaler<f64>> for ScalerRecord {
    fn from(scaler: &MinMaxScaler<f64>) -> ScalerRecord {
        ScalerRecord {
            format: SCALER_FORMAT.to_owned(),
            version: SCALER_VERSION,
            min: scaler.min.clone(),
            max: scaler.max.clone(),
        }
    }
}

impl ScalerRecord {
    /// Validate a record and turn it into a scaler
    pub fn into_scaler(self) -> Result<MinMaxScaler<f64>> {
        if self.format != SCALER_FORMAT {
            return Err(Error::ArtifactFormat(format!(
                "expected scaler format {:?}, found {:?}",
                SCALER_FORMAT, self.format
            )));
        }
        if self.version > SCALER_VERSION {
            return Err(Error::ArtifactFormat(format!(
                "scaler version {} is newer than supported version {}",
                self.version, SCALER_VERSION
            )));
        }
        if self.min.len() != self.max.len() {
            return Err(Error::ArtifactFormat(format!(
                "scaler has {} minima but {} maxima",
                self.min.len(),
                self.max.len()
            )));
        }
        Ok(MinMaxScaler {
            min: self.min,
            max: self.max,
        })
    }
}

/// Write a scaler to a Writer
pub fn write_scaler<W: Write>(wtr: W, scaler: &MinMaxScaler<f64>) -> Result<()> {
    serde_json::to_writer_pretty(wtr, &ScalerRecord::from(scaler))?;
    Ok(())
}

/// Read a scaler from a Reader
pub fn read_scaler<R: Read>(rdr: R) -> Result<MinMaxScaler<f64>> {
    let record: ScalerRecord = serde_json::from_reader(rdr)?;
    record.into_scaler()
}

/// Save a scaler to a file
pub fn save_scaler(path: &Path, scaler: &MinMaxScaler<f64>) -> Result<()> {
    let mut wtr = BufWriter::new(File::create(path)?);
    write_scaler(&mut wtr, scaler)?;
    wtr.flush()?;
    Ok(())
}

/// Load a scaler from a file
pub fn load_scaler(path: &Path) -> Result<MinMaxScaler<f64>> {
    read_scaler(BufReader::new(File::open(path)?))
}
