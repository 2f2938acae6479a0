//! Backend method discriminators.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Value of the `method` form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "workbook.list")]
    WorkbookList,
    #[serde(rename = "worksheet.records.fetch")]
    RecordsFetch,
    #[serde(rename = "worksheet.records.add")]
    RecordsAdd,
    #[serde(rename = "worksheet.records.update")]
    RecordsUpdate,
    #[serde(rename = "worksheet.records.delete")]
    RecordsDelete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkbookList => "workbook.list",
            Self::RecordsFetch => "worksheet.records.fetch",
            Self::RecordsAdd => "worksheet.records.add",
            Self::RecordsUpdate => "worksheet.records.update",
            Self::RecordsDelete => "worksheet.records.delete",
        }
    }

    /// Parse a wire discriminator.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "workbook.list" => Some(Self::WorkbookList),
            "worksheet.records.fetch" => Some(Self::RecordsFetch),
            "worksheet.records.add" => Some(Self::RecordsAdd),
            "worksheet.records.update" => Some(Self::RecordsUpdate),
            "worksheet.records.delete" => Some(Self::RecordsDelete),
            _ => None,
        }
    }

    /// Whether the method mutates worksheet rows.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::RecordsAdd | Self::RecordsUpdate | Self::RecordsDelete
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
