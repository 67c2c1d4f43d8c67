//! Layout model: the schema of an SDDS file
//!
//! A [`Layout`] holds ordered column, parameter and array definitions plus
//! informational associates. Insertion order is on-disk order, and the index
//! returned by [`Layout::define`] stays valid for the life of the layout.

use alloc::string::String;
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::error::{Result, SddsError};
use crate::format::header::field_from_text;
use crate::format::{DataMode, DataType};
use crate::validation::{validate_format_string, validate_name};
use crate::value::{unquote_line, Value};

/// The three namespaces of named data in a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldKind {
    Column,
    Parameter,
    Array,
}

impl FieldKind {
    pub const ALL: [FieldKind; 3] = [FieldKind::Column, FieldKind::Parameter, FieldKind::Array];

    /// Header directive that declares fields of this kind
    pub const fn directive(self) -> &'static str {
        match self {
            FieldKind::Column => "column",
            FieldKind::Parameter => "parameter",
            FieldKind::Array => "array",
        }
    }

    const fn slot(self) -> usize {
        match self {
            FieldKind::Column => 0,
            FieldKind::Parameter => 1,
            FieldKind::Array => 2,
        }
    }
}

impl core::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.directive())
    }
}

/// Definition of one column, parameter or array
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub data_type: DataType,
    pub symbol: Option<String>,
    pub units: Option<String>,
    pub description: Option<String>,
    pub format_string: Option<String>,
    /// Parameters only: value carried in the header instead of each page
    pub fixed_value: Option<String>,
    /// Columns and arrays: advisory text field width, 0 when unset
    pub field_length: i32,
    /// Arrays only: number of dimensions, at least 1
    pub dimensions: u32,
    /// Arrays only
    pub group_name: Option<String>,
}

impl FieldDef {
    fn new(kind: FieldKind, name: &str, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            kind,
            data_type,
            symbol: None,
            units: None,
            description: None,
            format_string: None,
            fixed_value: None,
            field_length: 0,
            dimensions: if kind == FieldKind::Array { 1 } else { 0 },
            group_name: None,
        }
    }

    pub fn column(name: &str, data_type: DataType) -> Self {
        Self::new(FieldKind::Column, name, data_type)
    }

    pub fn parameter(name: &str, data_type: DataType) -> Self {
        Self::new(FieldKind::Parameter, name, data_type)
    }

    pub fn array(name: &str, data_type: DataType, dimensions: u32) -> Self {
        let mut def = Self::new(FieldKind::Array, name, data_type);
        def.dimensions = dimensions;
        def
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_format(mut self, format_string: &str) -> Self {
        self.format_string = Some(format_string.into());
        self
    }

    pub fn with_fixed_value(mut self, fixed_value: &str) -> Self {
        self.fixed_value = Some(fixed_value.into());
        self
    }

    pub fn with_field_length(mut self, field_length: i32) -> Self {
        self.field_length = field_length;
        self
    }

    pub fn with_group_name(mut self, group_name: &str) -> Self {
        self.group_name = Some(group_name.into());
        self
    }

    /// Same definition under another name
    pub fn renamed(mut self, name: &str) -> Self {
        self.name = name.into();
        self
    }

    /// The header's fixed value scanned as this field's kind
    pub fn parsed_fixed_value(&self) -> Option<Result<Value>> {
        let text = self.fixed_value.as_deref()?;
        let text = unquote_line(text);
        Some(
            Value::parse(self.data_type, &text)
                .ok_or_else(|| SddsError::bad_value(&self.name, None, &text, self.data_type)),
        )
    }

    fn validate(&self, any_name: bool) -> Result<()> {
        if !any_name {
            validate_name(self.kind, &self.name)?;
        } else if self.name.is_empty() {
            return Err(SddsError::InvalidName {
                kind: self.kind,
                name: String::new(),
            });
        }
        if self.kind == FieldKind::Array && self.dimensions == 0 {
            return Err(SddsError::DimensionMismatch {
                name: self.name.clone(),
                reason: "arrays need at least one dimension".into(),
            });
        }
        if let Some(format) = &self.format_string {
            validate_format_string(format, self.data_type)?;
        }
        if let Some(parsed) = self.parsed_fixed_value() {
            parsed?;
        }
        Ok(())
    }
}

/// Informational reference to a sibling file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssociateDef {
    pub name: String,
    pub filename: Option<String>,
    pub path: Option<String>,
    pub description: Option<String>,
    pub contents: Option<String>,
    /// Whether the associate is itself an SDDS file
    pub sdds: bool,
}

impl AssociateDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_filename(mut self, filename: &str) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// The schema of an SDDS file
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Layout {
    description: Option<String>,
    contents: Option<String>,
    data_mode: DataMode,
    fields: [Vec<FieldDef>; 3],
    associates: Vec<AssociateDef>,
    #[cfg_attr(feature = "serde", serde(skip))]
    index: [HashMap<String, usize>; 3],
    frozen: bool,
    any_name: bool,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unfrozen layout carrying a description and contents tag
    pub fn with_description(description: Option<&str>, contents: Option<&str>) -> Self {
        Self {
            description: description.map(String::from),
            contents: contents.map(String::from),
            ..Self::default()
        }
    }

    /// Accept names outside the usual character set
    pub fn allow_any_name(&mut self, allow: bool) {
        self.any_name = allow;
    }

    /// Make every further mutation fail with `AlreadyWritten`
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn check_mutable(&self) -> Result<()> {
        if self.frozen {
            Err(SddsError::AlreadyWritten)
        } else {
            Ok(())
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }

    pub fn set_description(&mut self, description: Option<&str>, contents: Option<&str>) -> Result<()> {
        self.check_mutable()?;
        self.description = description.map(String::from);
        self.contents = contents.map(String::from);
        Ok(())
    }

    pub fn data_mode(&self) -> &DataMode {
        &self.data_mode
    }

    pub fn set_data_mode(&mut self, data_mode: DataMode) -> Result<()> {
        self.check_mutable()?;
        self.data_mode = data_mode;
        Ok(())
    }

    /// Append a definition and return its index within its kind
    ///
    /// Fails without modifying the layout if the name is taken or invalid,
    /// the format string does not suit the type, or the layout is frozen.
    pub fn define(&mut self, def: FieldDef) -> Result<usize> {
        self.check_mutable()?;
        def.validate(self.any_name)?;
        let slot = def.kind.slot();
        if self.index[slot].contains_key(&def.name) {
            return Err(SddsError::DuplicateName {
                kind: def.kind,
                name: def.name,
            });
        }
        let position = self.fields[slot].len();
        log::trace!("defining {} {} as {}", def.kind, def.name, def.data_type);
        self.index[slot].insert(def.name.clone(), position);
        self.fields[slot].push(def);
        Ok(position)
    }

    pub fn define_associate(&mut self, associate: AssociateDef) -> Result<usize> {
        self.check_mutable()?;
        if self.associates.iter().any(|a| a.name == associate.name) {
            return Err(SddsError::Message {
                severity: crate::Severity::Fatal,
                message: alloc::format!("associate {:?} already exists", associate.name),
            });
        }
        self.associates.push(associate);
        Ok(self.associates.len() - 1)
    }

    /// Parse and define a single `&column ... &end` style directive
    ///
    /// An unknown directive is a recoverable error here. Unknown attributes
    /// are logged and ignored.
    pub fn define_from_text(&mut self, text: &str) -> Result<usize> {
        let mut warnings = Vec::new();
        let def = field_from_text(text, &mut warnings)?;
        for warning in &warnings {
            log::warn!("{warning}");
        }
        self.define(def)
    }

    pub fn index_of(&self, kind: FieldKind, name: &str) -> Option<usize> {
        self.index[kind.slot()].get(name).copied()
    }

    /// Index of `name`, or `NameNotFound`
    pub fn require(&self, kind: FieldKind, name: &str) -> Result<usize> {
        self.index_of(kind, name).ok_or_else(|| SddsError::NameNotFound {
            kind,
            name: name.into(),
        })
    }

    pub fn field(&self, kind: FieldKind, index: usize) -> Option<&FieldDef> {
        self.fields[kind.slot()].get(index)
    }

    pub fn field_by_name(&self, kind: FieldKind, name: &str) -> Option<&FieldDef> {
        self.index_of(kind, name).and_then(|i| self.field(kind, i))
    }

    /// Definitions of `kind` in insertion order
    pub fn fields(&self, kind: FieldKind) -> &[FieldDef] {
        &self.fields[kind.slot()]
    }

    pub fn columns(&self) -> &[FieldDef] {
        self.fields(FieldKind::Column)
    }

    pub fn parameters(&self) -> &[FieldDef] {
        self.fields(FieldKind::Parameter)
    }

    pub fn arrays(&self) -> &[FieldDef] {
        self.fields(FieldKind::Array)
    }

    pub fn associates(&self) -> &[AssociateDef] {
        &self.associates
    }

    pub fn len(&self, kind: FieldKind) -> usize {
        self.fields[kind.slot()].len()
    }

    pub fn for_each<F>(&self, kind: FieldKind, mut f: F)
    where
        F: FnMut(usize, &FieldDef),
    {
        for (i, def) in self.fields(kind).iter().enumerate() {
            f(i, def);
        }
    }

    pub fn names(&self, kind: FieldKind) -> Vec<&str> {
        self.fields(kind).iter().map(|d| d.name.as_str()).collect()
    }

    /// Copy one definition from `src`, keeping its type and metadata
    pub fn transfer_definition(
        &mut self,
        src: &Layout,
        kind: FieldKind,
        name: &str,
        rename: Option<&str>,
    ) -> Result<usize> {
        self.check_mutable()?;
        let def = src
            .field_by_name(kind, name)
            .ok_or_else(|| SddsError::NameNotFound {
                kind,
                name: name.into(),
            })?
            .clone();
        let def = match rename {
            Some(new_name) => def.renamed(new_name),
            None => def,
        };
        self.define(def)
    }

    /// Copy every definition of `kind` from `src`, all or nothing
    pub fn transfer_all(&mut self, src: &Layout, kind: FieldKind) -> Result<()> {
        self.check_mutable()?;
        let before = self.len(kind);
        for def in src.fields(kind) {
            if let Err(err) = self.define(def.clone()) {
                self.truncate(kind, before);
                return Err(err);
            }
        }
        Ok(())
    }

    fn truncate(&mut self, kind: FieldKind, len: usize) {
        let slot = kind.slot();
        for def in self.fields[slot].drain(len..) {
            self.index[slot].remove(&def.name);
        }
    }

    /// Rebuild the name index, for layouts that were deserialized
    pub fn reindex(&mut self) {
        for slot in 0..3 {
            self.index[slot] = self.fields[slot]
                .iter()
                .enumerate()
                .map(|(i, d)| (d.name.clone(), i))
                .collect();
        }
    }

    /// Compare definitions, ignoring data mode and frozen state
    pub fn same_definitions(&self, other: &Layout) -> bool {
        self.description == other.description
            && self.contents == other.contents
            && self.fields == other.fields
            && self.associates == other.associates
    }
}
