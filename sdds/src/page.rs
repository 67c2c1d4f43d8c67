//! In-memory contents of one page
//!
//! A [`Page`] owns its parameter values, array blocks and column buffers. The
//! reader replaces its page on every `read_page`, so borrows obtained through
//! [`Page::internal_column`] cannot outlive the transition; [`Page::get_column`]
//! returns an owned copy instead.

use std::sync::Arc;

use sdds_core::{
    ArrayData, ColumnData, DataType, Element, FieldDef, FieldKind, Layout, Result, RowMask,
    SddsError, Value,
};

/// One page of a dataset
#[derive(Debug, Clone)]
pub struct Page {
    layout: Arc<Layout>,
    page_number: u32,
    row_count: Option<usize>,
    parameters: Vec<Option<Value>>,
    arrays: Vec<ArrayData>,
    columns: Vec<Option<ColumnData>>,
    mask: RowMask,
}

/// Fully decoded page contents, in layout order
#[derive(Debug, Clone)]
pub(crate) struct PageBody {
    pub parameters: Vec<Value>,
    pub arrays: Vec<ArrayData>,
    pub columns: Vec<ColumnData>,
    pub row_count: usize,
}

fn wrong_type(name: &str, expected: impl ToString, actual: DataType) -> SddsError {
    SddsError::WrongType {
        name: name.into(),
        expected: expected.to_string(),
        actual,
    }
}

/// Convert `data` to the declared type of `def`
fn conform(def: &FieldDef, data: ColumnData) -> Result<ColumnData> {
    if data.data_type() == def.data_type {
        return Ok(data);
    }
    let actual = data.data_type();
    data.cast(def.data_type)
        .ok_or_else(|| wrong_type(&def.name, def.data_type, actual))
}

impl Page {
    /// Empty page with no rows, fixed-value parameters filled in
    pub fn new(layout: Arc<Layout>) -> Self {
        let parameters = layout
            .parameters()
            .iter()
            .map(|def| def.parsed_fixed_value().and_then(|v| v.ok()))
            .collect();
        let arrays = layout
            .arrays()
            .iter()
            .map(|def| ArrayData::empty(def.data_type, def.dimensions as usize))
            .collect();
        let columns = vec![None; layout.columns().len()];
        Self {
            layout,
            page_number: 0,
            row_count: None,
            parameters,
            arrays,
            columns,
            mask: RowMask::all(0),
        }
    }

    pub(crate) fn from_body(layout: Arc<Layout>, page_number: u32, body: PageBody) -> Self {
        Self {
            layout,
            page_number,
            row_count: Some(body.row_count),
            parameters: body.parameters.into_iter().map(Some).collect(),
            arrays: body.arrays,
            columns: body.columns.into_iter().map(Some).collect(),
            mask: RowMask::all(body.row_count),
        }
    }

    pub(crate) fn set_page_number(&mut self, page_number: u32) {
        self.page_number = page_number;
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// 1-based page ordinal, 0 before any page
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Rows on this page; 0 until a column commits the count
    pub fn row_count(&self) -> usize {
        self.row_count.unwrap_or(0)
    }

    /// Commit the row count without setting a column
    pub fn set_row_count(&mut self, rows: usize) -> Result<()> {
        if let Some(committed) = self.row_count {
            if committed != rows && self.columns.iter().any(Option::is_some) {
                return Err(SddsError::RowCountMismatch {
                    name: "page".into(),
                    expected: committed,
                    actual: rows,
                });
            }
        }
        self.row_count = Some(rows);
        self.mask = RowMask::all(rows);
        Ok(())
    }

    // Parameters

    pub fn parameter_at(&self, index: usize) -> Option<&Value> {
        self.parameters.get(index)?.as_ref()
    }

    pub fn parameter(&self, name: &str) -> Result<&Value> {
        let index = self.layout.require(FieldKind::Parameter, name)?;
        self.parameter_at(index)
            .ok_or_else(|| SddsError::MissingParameter { name: name.into() })
    }

    /// Typed parameter value; the kind must match exactly
    pub fn parameter_as<T: Element>(&self, name: &str) -> Result<T> {
        let value = self.parameter(name)?;
        T::from_value(value).ok_or_else(|| wrong_type(name, T::data_type(), value.data_type()))
    }

    /// Set a parameter, converting between numeric kinds
    pub fn set_parameter(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let index = self.layout.require(FieldKind::Parameter, name)?;
        self.set_parameter_at(index, value.into())
    }

    pub fn set_parameter_at(&mut self, index: usize, value: Value) -> Result<()> {
        let def = self
            .layout
            .field(FieldKind::Parameter, index)
            .ok_or_else(|| SddsError::NameNotFound {
                kind: FieldKind::Parameter,
                name: format!("#{index}"),
            })?;
        let actual = value.data_type();
        let value = value
            .cast(def.data_type)
            .ok_or_else(|| wrong_type(&def.name, def.data_type, actual))?;
        self.parameters[index] = Some(value);
        Ok(())
    }

    // Arrays

    pub fn array_at(&self, index: usize) -> Option<&ArrayData> {
        self.arrays.get(index)
    }

    pub fn array(&self, name: &str) -> Result<&ArrayData> {
        let index = self.layout.require(FieldKind::Array, name)?;
        Ok(&self.arrays[index])
    }

    /// Set an array block; the product of `dims` must equal the element count
    pub fn set_array(&mut self, name: &str, dims: &[u32], data: impl Into<ColumnData>) -> Result<()> {
        let index = self.layout.require(FieldKind::Array, name)?;
        self.set_array_at(index, dims, data.into())
    }

    pub fn set_array_at(&mut self, index: usize, dims: &[u32], data: ColumnData) -> Result<()> {
        let def = self
            .layout
            .field(FieldKind::Array, index)
            .ok_or_else(|| SddsError::NameNotFound {
                kind: FieldKind::Array,
                name: format!("#{index}"),
            })?;
        if dims.len() != def.dimensions as usize {
            return Err(SddsError::DimensionMismatch {
                name: def.name.clone(),
                reason: format!("expected {} dimensions, got {}", def.dimensions, dims.len()),
            });
        }
        let expected = sdds_core::validation::checked_element_count(dims).ok_or_else(|| {
            SddsError::DimensionMismatch {
                name: def.name.clone(),
                reason: "element count overflows".into(),
            }
        })?;
        if expected != data.len() {
            return Err(SddsError::DimensionMismatch {
                name: def.name.clone(),
                reason: format!("dimensions {dims:?} hold {expected} elements, got {}", data.len()),
            });
        }
        let data = conform(def, data)?;
        self.arrays[index] = ArrayData {
            dims: dims.to_vec(),
            data,
        };
        Ok(())
    }

    // Columns

    fn column_index(&self, name: &str) -> Result<usize> {
        self.layout.require(FieldKind::Column, name)
    }

    /// Set a column's values
    ///
    /// The first column set commits the page's row count; later columns must
    /// match it.
    pub fn set_column(&mut self, name: &str, data: impl Into<ColumnData>) -> Result<()> {
        let index = self.column_index(name)?;
        self.set_column_at(index, data.into())
    }

    pub fn set_column_at(&mut self, index: usize, data: ColumnData) -> Result<()> {
        let def = self
            .layout
            .field(FieldKind::Column, index)
            .ok_or_else(|| SddsError::NameNotFound {
                kind: FieldKind::Column,
                name: format!("#{index}"),
            })?;
        if let Some(expected) = self.row_count {
            if expected != data.len() {
                return Err(SddsError::RowCountMismatch {
                    name: def.name.clone(),
                    expected,
                    actual: data.len(),
                });
            }
        }
        let data = conform(def, data)?;
        if self.row_count.is_none() {
            self.row_count = Some(data.len());
            self.mask = RowMask::all(data.len());
        }
        self.columns[index] = Some(data);
        Ok(())
    }

    pub fn column_at(&self, index: usize) -> Option<&ColumnData> {
        self.columns.get(index)?.as_ref()
    }

    /// Borrow a column buffer; the borrow ends at the next page transition
    pub fn internal_column(&self, name: &str) -> Result<&ColumnData> {
        let index = self.column_index(name)?;
        self.column_at(index).ok_or_else(|| SddsError::ColumnNotSet {
            name: name.into(),
            rows: self.row_count(),
        })
    }

    /// Owned copy of a column, strings included
    pub fn get_column(&self, name: &str) -> Result<ColumnData> {
        self.internal_column(name).cloned()
    }

    /// Typed view of a column; the kind must match exactly
    pub fn column<T: Element>(&self, name: &str) -> Result<&[T]> {
        let data = self.internal_column(name)?;
        data.as_slice::<T>()
            .ok_or_else(|| wrong_type(name, T::data_type(), data.data_type()))
    }

    /// Numeric column widened to f64
    pub fn column_as_f64(&self, name: &str) -> Result<Vec<f64>> {
        let data = self.internal_column(name)?;
        data.to_f64_vec()
            .ok_or_else(|| wrong_type(name, "a numeric type", data.data_type()))
    }

    // Row selection

    pub fn row_mask(&self) -> &RowMask {
        &self.mask
    }

    pub fn set_row_flag(&mut self, row: usize, selected: bool) -> bool {
        self.mask.set(row, selected)
    }

    pub fn clear_row_flags(&mut self) {
        self.mask.clear_all();
    }

    pub fn select_all_rows(&mut self) {
        self.mask.select_all();
    }

    pub fn rows_of_interest(&self) -> Vec<usize> {
        self.mask.selected()
    }

    pub fn count_rows_of_interest(&self) -> usize {
        self.mask.count()
    }

    /// Selected rows of a column, in row order
    pub fn selected_column(&self, name: &str) -> Result<ColumnData> {
        Ok(self.internal_column(name)?.gather(&self.mask.selected()))
    }

    // Bulk copies

    /// Copy parameters with matching names from `src`
    ///
    /// Matching is by name, so the two layouts may order their parameters
    /// differently. Parameters missing from `src` keep their values.
    pub fn copy_parameters_from(&mut self, src: &Page) -> Result<()> {
        for index in 0..self.parameters.len() {
            let Some(def) = self.layout.field(FieldKind::Parameter, index) else {
                continue;
            };
            let Some(value) = src
                .layout
                .index_of(FieldKind::Parameter, &def.name)
                .and_then(|i| src.parameter_at(i))
            else {
                continue;
            };
            let value = value.clone();
            self.set_parameter_at(index, value)?;
        }
        Ok(())
    }

    /// Copy arrays with matching names from `src`
    pub fn copy_arrays_from(&mut self, src: &Page) -> Result<()> {
        for index in 0..self.arrays.len() {
            let Some(def) = self.layout.field(FieldKind::Array, index) else {
                continue;
            };
            let Some(block) = src
                .layout
                .index_of(FieldKind::Array, &def.name)
                .and_then(|i| src.array_at(i))
            else {
                continue;
            };
            let block = block.clone();
            self.set_array_at(index, &block.dims, block.data)?;
        }
        Ok(())
    }

    /// Copy parameters, arrays and columns with matching names from `src`
    ///
    /// Every row of `src` is copied and the destination selects all rows,
    /// whatever the source mask was.
    pub fn copy_from(&mut self, src: &Page) -> Result<()> {
        self.copy_parameters_from(src)?;
        self.copy_arrays_from(src)?;
        self.columns.iter_mut().for_each(|c| *c = None);
        self.row_count = Some(src.row_count());
        self.mask = RowMask::all(src.row_count());
        for index in 0..self.columns.len() {
            let Some(def) = self.layout.field(FieldKind::Column, index) else {
                continue;
            };
            let Some(data) = src
                .layout
                .index_of(FieldKind::Column, &def.name)
                .and_then(|i| src.column_at(i))
            else {
                continue;
            };
            let data = data.clone();
            self.set_column_at(index, data)?;
        }
        Ok(())
    }

    /// Check that the page can be written: parameters present and every
    /// column set when the page has rows
    pub(crate) fn validate_for_write(&self) -> Result<()> {
        for (def, value) in self.layout.parameters().iter().zip(&self.parameters) {
            if value.is_none() {
                return Err(SddsError::MissingParameter {
                    name: def.name.clone(),
                });
            }
        }
        let rows = self.row_count();
        if rows > 0 {
            for (def, data) in self.layout.columns().iter().zip(&self.columns) {
                if data.is_none() {
                    return Err(SddsError::ColumnNotSet {
                        name: def.name.clone(),
                        rows,
                    });
                }
            }
        }
        Ok(())
    }

    /// Column buffer for encoding; unset columns of an empty page are empty
    pub(crate) fn encoded_column(&self, index: usize) -> ColumnData {
        match self.column_at(index) {
            Some(data) => data.clone(),
            None => ColumnData::new(self.layout.columns()[index].data_type),
        }
    }

    pub(crate) fn columns_for_encoding(&self) -> Vec<std::borrow::Cow<'_, ColumnData>> {
        (0..self.columns.len())
            .map(|i| match self.column_at(i) {
                Some(data) => std::borrow::Cow::Borrowed(data),
                None => std::borrow::Cow::Owned(self.encoded_column(i)),
            })
            .collect()
    }

    pub(crate) fn parameter_values(&self) -> impl Iterator<Item = Option<&Value>> {
        self.parameters.iter().map(Option::as_ref)
    }

    pub(crate) fn arrays(&self) -> &[ArrayData] {
        &self.arrays
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdds_core::FieldDef;

    fn layout() -> Arc<Layout> {
        let mut layout = Layout::new();
        layout.define(FieldDef::column("x", DataType::F64)).unwrap();
        layout.define(FieldDef::column("n", DataType::I32)).unwrap();
        layout.define(FieldDef::parameter("note", DataType::String)).unwrap();
        layout
            .define(FieldDef::parameter("step", DataType::I64).with_fixed_value("3"))
            .unwrap();
        layout.define(FieldDef::array("m", DataType::F32, 2)).unwrap();
        Arc::new(layout)
    }

    #[test]
    fn test_row_count_commitment() {
        let mut page = Page::new(layout());
        assert_eq!(page.row_count(), 0);
        page.set_column("x", vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(page.row_count(), 3);
        let err = page.set_column("n", vec![1i32, 2]).unwrap_err();
        assert!(matches!(err, SddsError::RowCountMismatch { expected: 3, actual: 2, .. }));
        page.set_column("n", vec![1i32, 2, 3]).unwrap();
        assert_eq!(page.count_rows_of_interest(), 3);
    }

    #[test]
    fn test_rejected_column_leaves_row_count_open() {
        let mut page = Page::new(layout());
        let strings = vec![String::from("a"), String::from("b"), String::from("c")];
        assert!(matches!(
            page.set_column("x", strings),
            Err(SddsError::WrongType { .. })
        ));
        assert_eq!(page.row_count(), 0);
        assert!(page.column_at(0).is_none());
        page.set_column("x", vec![1.0, 2.0]).unwrap();
        assert_eq!(page.row_count(), 2);
        assert_eq!(page.count_rows_of_interest(), 2);
    }

    #[test]
    fn test_typed_access() {
        let mut page = Page::new(layout());
        page.set_column("x", vec![1.5f64, 2.5]).unwrap();
        // Integers convert on the way in.
        page.set_column("n", vec![4i64, 5]).unwrap();
        assert_eq!(page.column::<f64>("x").unwrap(), [1.5, 2.5]);
        assert_eq!(page.column::<i32>("n").unwrap(), [4, 5]);
        assert!(matches!(
            page.column::<f32>("x"),
            Err(SddsError::WrongType { .. })
        ));
        assert!(matches!(
            page.column::<f64>("nope"),
            Err(SddsError::NameNotFound { .. })
        ));
        assert_eq!(page.column_as_f64("n").unwrap(), [4.0, 5.0]);
        assert!(matches!(
            page.set_column("x", vec![String::from("a"), String::from("b")]),
            Err(SddsError::WrongType { .. })
        ));
    }

    #[test]
    fn test_parameters() {
        let mut page = Page::new(layout());
        assert_eq!(page.parameter_as::<i64>("step").unwrap(), 3);
        assert!(matches!(
            page.parameter("note"),
            Err(SddsError::MissingParameter { .. })
        ));
        page.set_parameter("note", "hello world").unwrap();
        assert_eq!(page.parameter("note").unwrap().as_str(), Some("hello world"));
        assert!(matches!(
            page.set_parameter("note", 4.0),
            Err(SddsError::WrongType { .. })
        ));
        assert!(matches!(
            page.parameter_as::<i32>("step"),
            Err(SddsError::WrongType { .. })
        ));
    }

    #[test]
    fn test_arrays() {
        let mut page = Page::new(layout());
        page.set_array("m", &[2, 3], vec![0.0f32; 6]).unwrap();
        assert_eq!(page.array("m").unwrap().dims, [2, 3]);
        assert!(matches!(
            page.set_array("m", &[2, 2], vec![0.0f32; 6]),
            Err(SddsError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            page.set_array("m", &[6], vec![0.0f32; 6]),
            Err(SddsError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_copy_from_selects_all_rows() {
        let shared = layout();
        let mut src = Page::new(shared.clone());
        src.set_parameter("note", "n").unwrap();
        src.set_column("x", vec![1.0, 2.0]).unwrap();
        src.set_column("n", vec![7i32, 8]).unwrap();
        src.set_row_flag(0, false);
        assert_eq!(src.count_rows_of_interest(), 1);
        assert_eq!(src.selected_column("n").unwrap(), ColumnData::I32(vec![8]));

        // Destination declares its parameters in another order and
        // stores x as f32.
        let mut dst_layout = Layout::new();
        dst_layout.define(FieldDef::parameter("step", DataType::I64)).unwrap();
        dst_layout.define(FieldDef::parameter("note", DataType::String)).unwrap();
        dst_layout.define(FieldDef::column("x", DataType::F32)).unwrap();
        let mut dst = Page::new(Arc::new(dst_layout));
        dst.copy_from(&src).unwrap();
        assert_eq!(dst.row_count(), 2);
        assert_eq!(dst.count_rows_of_interest(), 2);
        assert_eq!(dst.column::<f32>("x").unwrap(), [1.0, 2.0]);
        assert_eq!(dst.parameter("note").unwrap().as_str(), Some("n"));
        assert_eq!(dst.parameter_as::<i64>("step").unwrap(), 3);
    }

    #[test]
    fn test_validate_for_write() {
        let mut page = Page::new(layout());
        assert!(matches!(
            page.validate_for_write(),
            Err(SddsError::MissingParameter { .. })
        ));
        page.set_parameter("note", "").unwrap();
        assert!(page.validate_for_write().is_ok());
        page.set_column("x", vec![1.0]).unwrap();
        assert!(matches!(
            page.validate_for_write(),
            Err(SddsError::ColumnNotSet { .. })
        ));
    }
}
