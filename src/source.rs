//! Finds and reads the marketplace export files in an input directory.
//!
//! Each file is classified by its extension and the columns in its header
//! row. Files that match none of the known signatures are skipped.

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info};
use serde::{de::DeserializeOwned, Deserialize};
use serde_with::DeserializeFromStr;

use std::{
    collections::BTreeSet,
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::{
    error::{ReportError, Result},
    usd::Usd,
};

/// The four kinds of export the report is built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Sales,
    Returns,
    Inventory,
    Cost,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Sales,
        Category::Returns,
        Category::Inventory,
        Category::Cost,
    ];

    /// Returns the columns read from files of this category.
    #[must_use]
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Category::Sales => &[
                "amazon-order-id",
                "merchant-order-id",
                "purchase-date",
                "sku",
                "quantity",
                "product-name",
                "item-price",
            ],
            Category::Returns => &[
                "return-date",
                "sku",
                "quantity",
                "product-name",
                "reason",
                "order-id",
            ],
            Category::Inventory => &["sku", "afn-fulfillable-quantity", "product-name"],
            Category::Cost => &["SKU", "VENDOR COST"],
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Category::Sales => "sales",
            Category::Returns => "returns",
            Category::Inventory => "in stock",
            Category::Cost => "COGS",
        })
    }
}

/// How the fields of an export file are separated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    /// `.csv`, comma separated.
    Csv,
    /// `.txt`, tab separated.
    Tsv,
}

impl FileKind {
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("csv") {
            Some(FileKind::Csv)
        } else if ext.eq_ignore_ascii_case("txt") {
            Some(FileKind::Tsv)
        } else {
            None
        }
    }

    fn reader(self, text: &str) -> csv::Reader<&[u8]> {
        let mut builder = ReaderBuilder::new();
        builder.trim(Trim::All).flexible(true);
        if self == FileKind::Tsv {
            // order reports put raw quotes in product names
            builder.delimiter(b'\t').quoting(false);
        }
        builder.from_reader(text.as_bytes())
    }
}

struct Signature {
    kind: FileKind,
    column: &'static str,
    category: Category,
}

/// Checked in order; the first match wins.
const SIGNATURES: [Signature; 4] = [
    Signature {
        kind: FileKind::Csv,
        column: "return-date",
        category: Category::Returns,
    },
    Signature {
        kind: FileKind::Csv,
        column: "afn-fulfillable-quantity",
        category: Category::Inventory,
    },
    Signature {
        kind: FileKind::Csv,
        column: "VENDOR COST",
        category: Category::Cost,
    },
    Signature {
        kind: FileKind::Tsv,
        column: "signature-confirmation-recommended",
        category: Category::Sales,
    },
];

/// Returns the category of a file with the given kind and header row, or
/// `None` if the file is not one the report uses.
#[must_use]
pub fn classify(kind: FileKind, headers: &StringRecord) -> Option<Category> {
    SIGNATURES
        .iter()
        .find(|sig| sig.kind == kind && headers.iter().any(|h| h.trim() == sig.column))
        .map(|sig| sig.category)
}

/// A calendar day read from a date or timestamp column.
///
/// Timestamps like `2024-03-01T10:22:01+00:00` keep only the part before
/// the `T`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr)]
pub struct Day(pub NaiveDate);

impl FromStr for Day {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let date = s.split('T').next().unwrap_or_default().trim();
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map(Day)
    }
}

/// One line of an order report.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SaleRecord {
    pub order_id: String,
    pub merchant_order_id: Option<String>,
    pub purchase_date: NaiveDate,
    pub sku: String,
    pub quantity: i64,
    pub product_name: String,
    /// Price of a single unit.
    pub price: Usd,
}

/// One line of a customer returns report.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReturnRecord {
    /// As exported; the report never reads it as a date.
    pub return_date: String,
    /// Blank if the export left it out, so the return matches no sale.
    pub order_id: String,
    pub sku: String,
    pub quantity: i64,
    pub product_name: String,
    pub reason: String,
}

/// One line of an inventory report.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InventoryRecord {
    pub sku: String,
    pub fulfillable_quantity: i64,
    pub product_name: String,
}

/// One line of a vendor cost sheet. The cost may be blank.
#[derive(Clone, Debug, PartialEq)]
pub struct CostRecord {
    pub sku: String,
    pub vendor_cost: Option<Usd>,
}

/// Maps the columns of one category onto its record type.
///
/// Every field is optional while reading; [`Projection::complete`] drops
/// rows the report can't use.
trait Projection: DeserializeOwned {
    type Record;
    const CATEGORY: Category;

    fn complete(self) -> Option<Self::Record>;
}

#[derive(Deserialize)]
struct RawSale {
    #[serde(rename = "amazon-order-id")]
    order_id: Option<String>,
    #[serde(rename = "merchant-order-id")]
    merchant_order_id: Option<String>,
    #[serde(rename = "purchase-date")]
    purchase_date: Option<Day>,
    sku: Option<String>,
    quantity: Option<i64>,
    #[serde(rename = "product-name")]
    product_name: Option<String>,
    #[serde(rename = "item-price")]
    price: Option<Usd>,
}

impl Projection for RawSale {
    type Record = SaleRecord;
    const CATEGORY: Category = Category::Sales;

    fn complete(self) -> Option<SaleRecord> {
        Some(SaleRecord {
            order_id: self.order_id?,
            merchant_order_id: self.merchant_order_id,
            purchase_date: self.purchase_date?.0,
            sku: self.sku?,
            quantity: self.quantity?,
            product_name: self.product_name?,
            price: self.price?,
        })
    }
}

#[derive(Deserialize)]
struct RawReturn {
    #[serde(rename = "return-date")]
    return_date: Option<String>,
    #[serde(rename = "order-id")]
    order_id: Option<String>,
    sku: Option<String>,
    quantity: Option<i64>,
    #[serde(rename = "product-name")]
    product_name: Option<String>,
    reason: Option<String>,
}

impl Projection for RawReturn {
    type Record = ReturnRecord;
    const CATEGORY: Category = Category::Returns;

    fn complete(self) -> Option<ReturnRecord> {
        Some(ReturnRecord {
            return_date: self.return_date.unwrap_or_default(),
            order_id: self.order_id.unwrap_or_default(),
            sku: self.sku?,
            quantity: self.quantity?,
            product_name: self.product_name.unwrap_or_default(),
            reason: self.reason.unwrap_or_default(),
        })
    }
}

#[derive(Deserialize)]
struct RawInventory {
    sku: Option<String>,
    #[serde(rename = "afn-fulfillable-quantity")]
    fulfillable_quantity: Option<i64>,
    #[serde(rename = "product-name")]
    product_name: Option<String>,
}

impl Projection for RawInventory {
    type Record = InventoryRecord;
    const CATEGORY: Category = Category::Inventory;

    fn complete(self) -> Option<InventoryRecord> {
        Some(InventoryRecord {
            sku: self.sku?,
            fulfillable_quantity: self.fulfillable_quantity?,
            product_name: self.product_name?,
        })
    }
}

#[derive(Deserialize)]
struct RawCost {
    #[serde(rename = "SKU")]
    sku: Option<String>,
    #[serde(rename = "VENDOR COST")]
    vendor_cost: Option<Usd>,
}

impl Projection for RawCost {
    type Record = CostRecord;
    const CATEGORY: Category = Category::Cost;

    fn complete(self) -> Option<CostRecord> {
        Some(CostRecord {
            sku: self.sku?,
            vendor_cost: self.vendor_cost,
        })
    }
}

/// Everything read from an input directory, before filtering.
#[derive(Debug, Default)]
pub struct Sources {
    pub sales: Vec<SaleRecord>,
    pub returns: Vec<ReturnRecord>,
    pub inventory: Vec<InventoryRecord>,
    pub costs: Vec<CostRecord>,
}

impl Sources {
    /// Reads every recognised export file directly inside `dir`.
    ///
    /// Files are visited in name order. Unrecognised files are skipped.
    ///
    /// # Errors
    ///
    /// Returns errors if:
    /// * `dir` or one of its files cannot be read
    /// * A recognised file lacks one of the columns its category needs
    /// * A numeric or date column holds something unparseable
    /// * No file at all was found for one or more categories
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = fs::read_dir(dir)
            .and_then(|entries| {
                entries
                    .map(|entry| entry.map(|e| e.path()))
                    .collect::<std::io::Result<Vec<PathBuf>>>()
            })
            .map_err(|source| ReportError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        paths.sort();

        let mut sources = Self::default();
        let mut found = BTreeSet::new();
        for path in paths.iter().filter(|p| p.is_file()) {
            let Some(kind) = FileKind::from_path(path) else {
                debug!("skipping {}: not a .csv or .txt file", path.display());
                continue;
            };
            let text = read_text(path)?;
            let mut rdr = kind.reader(&text);
            let headers = rdr.headers()?.clone();
            let Some(category) = classify(kind, &headers) else {
                debug!("skipping {}: unrecognised header", path.display());
                continue;
            };
            info!("reading {} as a {category} file", path.display());
            found.insert(category);
            match category {
                Category::Sales => sources.sales.extend(read_rows::<RawSale>(rdr, &headers, path)?),
                Category::Returns => {
                    sources.returns.extend(read_rows::<RawReturn>(rdr, &headers, path)?);
                }
                Category::Inventory => {
                    sources.inventory.extend(read_rows::<RawInventory>(rdr, &headers, path)?);
                }
                Category::Cost => sources.costs.extend(read_rows::<RawCost>(rdr, &headers, path)?),
            }
        }

        let missing: Vec<Category> = Category::ALL
            .into_iter()
            .filter(|c| !found.contains(c))
            .collect();
        if !missing.is_empty() {
            return Err(ReportError::MissingSources(missing));
        }
        Ok(sources)
    }
}

/// Reads `path` as UTF-8, falling back to Windows-1252 for older exports.
fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = match encoding_rs::UTF_8.decode_without_bom_handling_and_without_replacement(&bytes) {
        Some(text) => text,
        None => {
            debug!("{} is not UTF-8, decoding as Windows-1252", path.display());
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            text
        }
    };
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

fn read_rows<P: Projection>(
    mut rdr: csv::Reader<&[u8]>,
    headers: &StringRecord,
    path: &Path,
) -> Result<Vec<P::Record>> {
    let missing: Vec<String> = P::CATEGORY
        .columns()
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(ToString::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(ReportError::Schema {
            path: path.to_path_buf(),
            missing,
        });
    }

    let mut records = Vec::new();
    let mut dropped = 0;
    for result in rdr.deserialize::<P>() {
        let raw = result.map_err(|source| {
            if matches!(source.kind(), csv::ErrorKind::Deserialize { .. }) {
                ReportError::NonNumeric {
                    category: P::CATEGORY,
                    path: path.to_path_buf(),
                    source,
                }
            } else {
                ReportError::Csv(source)
            }
        })?;
        match raw.complete() {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!("{}: dropped {dropped} incomplete rows", path.display());
    }
    Ok(records)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::io::Write;

    /// Copies the complete fixture set into a temporary directory, leaving
    /// out `omit` and adding `extra` files.
    pub(crate) fn fixture_dir(omit: &[&str], extra: &[(&str, &[u8])]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for entry in fs::read_dir("testdata/complete").unwrap() {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_str().unwrap();
            if !omit.contains(&name) {
                fs::copy(&path, dir.path().join(name)).unwrap();
            }
        }
        for (name, contents) in extra {
            let mut file = fs::File::create(dir.path().join(name)).unwrap();
            file.write_all(contents).unwrap();
        }
        dir
    }

    #[test]
    fn classify_fn_recognises_each_signature() {
        let headers = |cols: &[&str]| StringRecord::from(cols.to_vec());
        assert_eq!(
            classify(FileKind::Csv, &headers(&["return-date", "sku"])),
            Some(Category::Returns)
        );
        assert_eq!(
            classify(FileKind::Csv, &headers(&["sku", "afn-fulfillable-quantity"])),
            Some(Category::Inventory)
        );
        assert_eq!(
            classify(FileKind::Csv, &headers(&["SKU", "VENDOR COST"])),
            Some(Category::Cost)
        );
        assert_eq!(
            classify(
                FileKind::Tsv,
                &headers(&["sku", "signature-confirmation-recommended "])
            ),
            Some(Category::Sales)
        );
    }

    #[test]
    fn classify_fn_checks_the_file_kind_as_well_as_the_header() {
        let sales = StringRecord::from(vec!["sku", "signature-confirmation-recommended"]);
        assert_eq!(classify(FileKind::Csv, &sales), None);
        let returns = StringRecord::from(vec!["return-date", "sku"]);
        assert_eq!(classify(FileKind::Tsv, &returns), None);
        let other = StringRecord::from(vec!["date", "amount"]);
        assert_eq!(classify(FileKind::Csv, &other), None);
    }

    #[test]
    fn classify_fn_prefers_earlier_signatures() {
        let both = StringRecord::from(vec!["return-date", "afn-fulfillable-quantity"]);
        assert_eq!(classify(FileKind::Csv, &both), Some(Category::Returns));
    }

    #[test]
    fn day_from_str_fn_drops_the_time_of_day() {
        let want = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(Day::from_str("2024-03-01T10:22:01+00:00").unwrap().0, want);
        assert_eq!(Day::from_str("2024-03-01").unwrap().0, want);
        assert!(Day::from_str("03/01/2024").is_err());
    }

    #[test]
    fn load_dir_fn_reads_all_four_categories() {
        let sources = Sources::load_dir("testdata/complete").unwrap();
        // one duplicate kept, one row without a price dropped
        assert_eq!(sources.sales.len(), 10, "wrong sales");
        assert_eq!(sources.returns.len(), 5, "wrong returns");
        assert_eq!(sources.inventory.len(), 6, "wrong inventory");
        assert_eq!(sources.costs.len(), 5, "wrong costs");

        let first = &sources.sales[0];
        assert_eq!(first.order_id, "111-0000001");
        assert_eq!(first.merchant_order_id.as_deref(), Some("M1"));
        assert_eq!(first.purchase_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(first.product_name, "Acme Widget Large");
        assert_eq!(first.quantity, 2);
        assert_eq!(first.price, Usd::new(20.0));
    }

    #[test]
    fn load_dir_fn_keeps_sales_without_a_merchant_order_id() {
        let sources = Sources::load_dir("testdata/complete").unwrap();
        assert!(sources.sales.iter().any(|s| s.merchant_order_id.is_none()));
    }

    #[test]
    fn load_dir_fn_reports_every_missing_category() {
        let dir = fixture_dir(&["returns.csv", "cogs.csv"], &[]);
        match Sources::load_dir(dir.path()) {
            Err(ReportError::MissingSources(missing)) => {
                assert_eq!(missing, vec![Category::Returns, Category::Cost]);
            }
            other => panic!("want MissingSources, got {other:?}"),
        }
    }

    #[test]
    fn load_dir_fn_returns_schema_error_for_missing_column() {
        let dir = fixture_dir(
            &["returns.csv"],
            &[(
                "returns.csv",
                b"return-date,order-id,sku,product-name,quantity\n2024-03-06,1,A,Thing,1\n",
            )],
        );
        match Sources::load_dir(dir.path()) {
            Err(ReportError::Schema { missing, .. }) => assert_eq!(missing, vec!["reason"]),
            other => panic!("want Schema, got {other:?}"),
        }
    }

    #[test]
    fn load_dir_fn_returns_non_numeric_error_naming_the_category() {
        let dir = fixture_dir(
            &["cogs.csv"],
            &[("cogs.csv", b"SKU,VENDOR COST\nACME-W-L,six dollars\n")],
        );
        match Sources::load_dir(dir.path()) {
            Err(ReportError::NonNumeric { category, .. }) => assert_eq!(category, Category::Cost),
            other => panic!("want NonNumeric, got {other:?}"),
        }
    }

    #[test]
    fn load_dir_fn_decodes_latin1_files() {
        let dir = fixture_dir(
            &["inventory.csv"],
            &[(
                "inventory.csv",
                b"sku,product-name,afn-fulfillable-quantity\nCAF-1,Caf\xe9 Mug,3\n",
            )],
        );
        let sources = Sources::load_dir(dir.path()).unwrap();
        assert_eq!(sources.inventory[0].product_name, "Café Mug");
    }

    #[test]
    fn load_dir_fn_skips_unrecognised_files() {
        let dir = fixture_dir(
            &[],
            &[
                ("ledger.csv", b"date,amount\n2024-01-01,3\n"),
                ("readme.md", b"# notes\n"),
            ],
        );
        assert!(Sources::load_dir(dir.path()).is_ok());
    }

    #[test]
    fn load_dir_fn_returns_io_error_for_missing_directory() {
        assert!(matches!(
            Sources::load_dir("testdata/does-not-exist"),
            Err(ReportError::Io { .. })
        ));
    }
}
