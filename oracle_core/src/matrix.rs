//! Topology config parser.
//!
//! The config file carries the strictly upper triangle of a symmetric cost
//! matrix. Row `i` lists the costs from node `i` to nodes `i+1, i+2, ...`:
//!
//! ```text
//! # costs from A to B, C
//! 10 5
//! # cost from B to C
//! 7
//! ```
//!
//! which expands to
//!
//! ```text
//!      A   B   C
//!  A   0  10   5
//!  B  10   0   7
//!  C   5   7   0
//! ```
//!
//! Missing cells become `NO_EDGE`. Parsing is all-or-nothing: any bad token
//! or overlong row rejects the whole file.

use crate::error::ConfigError;
use crate::identity::{Identity, MAX_NODES};
use serde::Serialize;
use std::path::Path;

/// Sentinel cost meaning "no direct link".
pub const NO_EDGE: i32 = -1;

/// Symmetric N×N cost matrix with a zero diagonal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdjacencyMatrix {
    /// Number of nodes
    n: usize,

    /// Row-major cells, `n * n` entries
    cells: Vec<i32>,
}

impl AdjacencyMatrix {
    /// Creates an edge-less matrix of `n` nodes.
    pub fn unconnected(n: usize) -> Self {
        let mut cells = vec![NO_EDGE; n * n];
        for i in 0..n {
            cells[i * n + i] = 0;
        }
        Self { n, cells }
    }

    /// Returns the number of nodes.
    pub fn size(&self) -> usize {
        self.n
    }

    /// Returns the cost from `from` to `to`, `None` outside the matrix.
    ///
    /// A negative value means there is no edge.
    pub fn cost(&self, from: usize, to: usize) -> Option<i32> {
        if from < self.n && to < self.n {
            Some(self.cells[from * self.n + to])
        } else {
            None
        }
    }

    /// Returns true if `from` has a usable (non-negative) entry towards `to`.
    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        self.cost(from, to).map_or(false, |c| c >= 0)
    }

    /// Returns row `from` as a slice.
    pub fn row(&self, from: usize) -> Option<&[i32]> {
        if from < self.n {
            Some(&self.cells[from * self.n..(from + 1) * self.n])
        } else {
            None
        }
    }

    #[cfg(test)]
    pub(crate) fn set_cell(&mut self, i: usize, j: usize, cost: i32) {
        self.cells[i * self.n + j] = cost;
    }

    fn set_symmetric(&mut self, i: usize, j: usize, cost: i32) {
        self.cells[i * self.n + j] = cost;
        self.cells[j * self.n + i] = cost;
    }
}

impl std::fmt::Display for AdjacencyMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Adjacency Matrix ({} nodes):", self.n)?;
        write!(f, "    ")?;
        for j in 0..self.n {
            write!(f, "{:>4}", label(j))?;
        }
        writeln!(f)?;
        for i in 0..self.n {
            write!(f, "{:>4}", label(i))?;
            for j in 0..self.n {
                write!(f, "{:>4}", self.cells[i * self.n + j])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn label(index: usize) -> String {
    Identity::from_slot(index).map_or_else(|| "?".to_string(), |id| id.to_string())
}

/// Reads and parses a topology config file.
pub fn load(path: impl AsRef<Path>) -> Result<AdjacencyMatrix, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse_str(&text)
}

/// Parses topology config text.
pub fn parse_str(text: &str) -> Result<AdjacencyMatrix, ConfigError> {
    // (1-based line number, costs)
    let mut rows: Vec<(usize, Vec<i32>)> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut costs = Vec::new();
        for token in line.split_whitespace() {
            let cost: i32 = token.parse().map_err(|_| ConfigError::InvalidToken {
                line: line_no,
                token: token.to_string(),
            })?;
            if cost > i32::from(u16::MAX) {
                return Err(ConfigError::CostOutOfRange { line: line_no, cost });
            }
            costs.push(cost);
        }
        rows.push((line_no, costs));
    }

    if rows.is_empty() {
        return Err(ConfigError::Empty);
    }

    let n = rows.len() + 1;
    if n > MAX_NODES {
        return Err(ConfigError::TooManyNodes { nodes: n, max: MAX_NODES });
    }

    let mut matrix = AdjacencyMatrix::unconnected(n);
    for (i, (line_no, costs)) in rows.iter().enumerate() {
        let max = n - 1 - i;
        if costs.len() > max {
            return Err(ConfigError::RowOverflow {
                line: *line_no,
                row: i,
                entries: costs.len(),
                max,
            });
        }
        for (offset, &cost) in costs.iter().enumerate() {
            matrix.set_symmetric(i, i + 1 + offset, cost);
        }
    }

    Ok(matrix)
}
