use std::ops::{Index, IndexMut};

/// Dense row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

/// Travel time from machine `row` to machine `col`.
pub type TravelTimes = Matrix<u32>;
/// Price per `(machine, time slot)`.
pub type Multipliers = Matrix<f64>;
/// Capacity violation per `(machine, time slot)`.
pub type Subgradients = Matrix<i64>;

impl<T: Clone + Default> Matrix<T> {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![T::default(); rows * cols],
        }
    }

    /// Builds a `rows x cols` matrix from nested rows. Missing entries are
    /// filled with the default value, surplus entries are dropped.
    pub fn from_rows(rows: usize, cols: usize, values: &[Vec<T>]) -> Self {
        let mut matrix = Self::new(rows, cols);
        for (row, source) in values.iter().take(rows).enumerate() {
            for (col, value) in source.iter().take(cols).enumerate() {
                matrix[(row, col)] = value.clone();
            }
        }
        matrix
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T> Matrix<T> {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> &[T] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.data.iter_mut()
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        assert!(col < self.cols, "column {col} out of {}", self.cols);
        &self.data[row * self.cols + col]
    }
}

impl<T> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Self::Output {
        assert!(col < self.cols, "column {col} out of {}", self.cols);
        &mut self.data[row * self.cols + col]
    }
}
