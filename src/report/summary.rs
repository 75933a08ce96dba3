use ndarray::Array2;

/// Reduced values of one measure, aligned with the group labels.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureSeries {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupedSummary {
    pub key: String,
    pub labels: Vec<String>,
    pub measures: Vec<MeasureSeries>,
}

impl GroupedSummary {
    pub fn measure(&self, name: &str) -> Option<&MeasureSeries> {
        self.measures.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointSet {
    pub x_name: String,
    pub y_name: String,
    pub points: Vec<(f64, f64)>,
}

/// Labeled matrix; `None` marks an undefined cell.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixSummary {
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    pub values: Array2<Option<f64>>,
}

impl MatrixSummary {
    pub fn row_sums(&self) -> Vec<f64> {
        self.values
            .rows()
            .into_iter()
            .map(|row| row.iter().flatten().sum())
            .collect()
    }

    pub fn column_sums(&self) -> Vec<f64> {
        self.values
            .columns()
            .into_iter()
            .map(|column| column.iter().flatten().sum())
            .collect()
    }

    pub fn get(&self, row: &str, column: &str) -> Option<f64> {
        let r = self.row_labels.iter().position(|l| l == row)?;
        let c = self.column_labels.iter().position(|l| l == column)?;
        self.values[[r, c]]
    }
}

/// Output of one view's aggregation step, handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum Summary {
    Grouped(GroupedSummary),
    Points(PointSet),
    Matrix(MatrixSummary),
}

impl Summary {
    pub fn kind(&self) -> &'static str {
        match self {
            Summary::Grouped(_) => "grouped",
            Summary::Points(_) => "points",
            Summary::Matrix(_) => "matrix",
        }
    }

    /// Number of groups, points or matrix rows.
    pub fn size(&self) -> usize {
        match self {
            Summary::Grouped(grouped) => grouped.labels.len(),
            Summary::Points(points) => points.points.len(),
            Summary::Matrix(matrix) => matrix.row_labels.len(),
        }
    }
}
