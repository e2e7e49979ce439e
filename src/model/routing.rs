use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use super::network::{Network, NodeId};
use super::path::Path;
use crate::error::{PathflowError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demand {
    pub index: usize,
    pub ingress: NodeId,
    pub egress: NodeId,
    pub offered_traffic: f64,
}

impl Demand {
    pub fn new(index: usize, ingress: NodeId, egress: NodeId, offered_traffic: f64) -> Self {
        Self {
            index,
            ingress,
            egress,
            offered_traffic,
        }
    }

    pub fn validate(&self, network: &Network) -> Result<()> {
        network.check_node(self.ingress)?;
        network.check_node(self.egress)?;
        if self.offered_traffic.is_nan() || self.offered_traffic < 0.0 {
            return Err(PathflowError::InvalidRouting(format!(
                "demand {} offers negative traffic {}",
                self.index, self.offered_traffic
            )));
        }
        Ok(())
    }
}

/// Dense row-major matrix addressed by (entity index, link index).
///
/// Used for every routing shape: `f_te`, `f_de`, `x_de` and `x_te`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl RoutingMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in &rows {
            if row.len() != cols {
                return Err(PathflowError::DimensionMismatch {
                    what: "matrix row",
                    expected: cols,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn set_row(&mut self, row: usize, values: &[f64]) -> Result<()> {
        if values.len() != self.cols {
            return Err(PathflowError::DimensionMismatch {
                what: "matrix row",
                expected: self.cols,
                actual: values.len(),
            });
        }
        self.row_mut(row).copy_from_slice(values);
        Ok(())
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows).map(|row| self.row(row).to_vec()).collect()
    }

    pub fn check_shape(&self, what: &'static str, rows: usize, cols: usize) -> Result<()> {
        if self.rows != rows {
            return Err(PathflowError::DimensionMismatch {
                what,
                expected: rows,
                actual: self.rows,
            });
        }
        if self.cols != cols {
            return Err(PathflowError::DimensionMismatch {
                what,
                expected: cols,
                actual: self.cols,
            });
        }
        Ok(())
    }
}

impl Index<(usize, usize)> for RoutingMatrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        &self.data[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for RoutingMatrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        &mut self.data[row * self.cols + col]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleClassification {
    Loopless,
    OpenCycles,
    ClosedCycles,
}

/// One entry of an explicit path list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub demand: usize,
    pub path: Path,
    pub volume: f64,
}
