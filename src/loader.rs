use crate::aggregate::HierarchyIndex;
use crate::error::Result;
use crate::geo::region_code;
use crate::types::{CategoryRef, PurchaseRecord, RawAncestryRow, RawPurchaseRow};
use crate::util::{parse_f64_safe, parse_flag, parse_quantity};
use csv::ReaderBuilder;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurchaseLoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
    pub associations: usize,
    pub unknown_regions: usize,
    pub flagged_rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HierarchyLoadReport {
    pub total_rows: usize,
    pub commodities: usize,
    pub parse_errors: usize,
    pub without_category: usize,
}

pub fn load_purchases(path: impl AsRef<Path>) -> Result<(Vec<PurchaseRecord>, PurchaseLoadReport)> {
    let rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    read_csv_purchases(rdr)
}

pub fn read_purchases<R: Read>(reader: R) -> Result<(Vec<PurchaseRecord>, PurchaseLoadReport)> {
    let rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    read_csv_purchases(rdr)
}

fn read_csv_purchases<R: Read>(
    mut rdr: csv::Reader<R>,
) -> Result<(Vec<PurchaseRecord>, PurchaseLoadReport)> {
    let mut report = PurchaseLoadReport::default();
    let mut purchases: Vec<PurchaseRecord> = Vec::new();

    for result in rdr.deserialize::<RawPurchaseRow>() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(_) => {
                report.parse_errors += 1;
                continue;
            }
        };

        let required = (
            non_empty(row.institution),
            non_empty(row.region),
            non_empty(row.supplier),
            non_empty(row.commodity_id),
        );
        let (Some(institution), Some(region), Some(supplier), Some(commodity_id)) = required else {
            report.parse_errors += 1;
            continue;
        };

        // Associations of municipalities are not municipalities.
        if institution.to_uppercase().contains("ASOCIACION") {
            report.associations += 1;
            continue;
        }

        let quantity = match parse_quantity(row.quantity.as_deref()) {
            Some(q) => q,
            None => {
                report.parse_errors += 1;
                continue;
            }
        };
        let unit_price = match parse_f64_safe(row.unit_price.as_deref()) {
            Some(p) => p.round(),
            None => {
                report.parse_errors += 1;
                continue;
            }
        };

        let Some(region_code) = region_code(&region) else {
            report.unknown_regions += 1;
            continue;
        };

        let overpriced = parse_flag(row.is_expensive.as_deref());
        if overpriced.is_some() {
            report.flagged_rows += 1;
        }

        purchases.push(PurchaseRecord {
            institution,
            region_code,
            supplier,
            commodity_id,
            quantity: quantity as f64,
            unit_price,
            overpriced,
        });
    }

    report.loaded_rows = purchases.len();
    if report.unknown_regions > 0 {
        warn!(count = report.unknown_regions, "purchases with unknown region skipped");
    }
    info!(
        total = report.total_rows,
        loaded = report.loaded_rows,
        parse_errors = report.parse_errors,
        "purchases loaded"
    );
    Ok((purchases, report))
}

pub fn load_hierarchy(path: impl AsRef<Path>) -> Result<(HierarchyIndex, HierarchyLoadReport)> {
    let rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    read_csv_hierarchy(rdr)
}

pub fn read_hierarchy<R: Read>(reader: R) -> Result<(HierarchyIndex, HierarchyLoadReport)> {
    let rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    read_csv_hierarchy(rdr)
}

fn read_csv_hierarchy<R: Read>(mut rdr: csv::Reader<R>) -> Result<(HierarchyIndex, HierarchyLoadReport)> {
    let mut report = HierarchyLoadReport::default();
    let mut index = HierarchyIndex::new();

    for result in rdr.deserialize::<RawAncestryRow>() {
        report.total_rows += 1;
        let Ok(row) = result else {
            report.parse_errors += 1;
            continue;
        };
        let ids = (
            non_empty(row.segment_id),
            non_empty(row.family_id),
            non_empty(row.class_id),
            non_empty(row.commodity_id),
        );
        let (Some(segment_id), Some(family_id), Some(class_id), Some(commodity_id)) = ids else {
            report.parse_errors += 1;
            continue;
        };
        // Names fall back to the code so a node is never unlabelled.
        let segment = CategoryRef::new(segment_id.clone(), non_empty(row.segment_name).unwrap_or(segment_id));
        let family = CategoryRef::new(family_id.clone(), non_empty(row.family_name).unwrap_or(family_id));
        let class = CategoryRef::new(class_id.clone(), non_empty(row.class_name).unwrap_or(class_id));

        if !index.insert(commodity_id, segment, family, class) {
            report.without_category += 1;
        }
    }

    report.commodities = index.len();
    info!(
        rows = report.total_rows,
        commodities = report.commodities,
        "commodity hierarchy loaded"
    );
    Ok((index, report))
}

fn non_empty(s: Option<String>) -> Option<String> {
    let s = s?.trim().to_string();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::HierarchyLookup;

    const PURCHASES: &str = "\
Institucion,RegionUnidadCompra,Proveedor,CodigoProductoONU,CantidadItem,Precio_Unitario_TOTAL,is_expensive
ILUSTRE MUNICIPALIDAD DE TALCA,Región del Maule,Ferreteria Sur,10101501,3,1000.4,1
ASOCIACION DE MUNICIPIOS,Región del Maule,Ferreteria Sur,10101501,3,1000,0
MUNICIPALIDAD DE ARICA,Región de Arica y Parinacota,Libreria Norte,44121701,10,250,0
MUNICIPALIDAD DE ATLANTIS,Region Perdida,Libreria Norte,44121701,10,250,0
MUNICIPALIDAD DE TALCA,Región del Maule,,44121701,1,1,
MUNICIPALIDAD DE TALCA,Región del Maule,Libreria Norte,44121701,uno,1,
";

    const HIERARCHY: &str = "\
segment_id,segment_name,family_id,family_name,class_id,class_name,commodity_id
10000000,Material Vivo,10100000,Animales vivos,10101500,Animales de granja,10101501
44000000,Equipos de Oficina,44120000,Suministros de oficina,44121700,Instrumentos de escritura,44121701
99000000,,99100000,Sin nombre,99101500,Clase,99101501
,,,,,,12345
";

    #[test]
    fn purchases_are_cleaned_and_counted() {
        let (purchases, report) = read_purchases(PURCHASES.as_bytes()).unwrap();
        assert_eq!(report.total_rows, 6);
        assert_eq!(report.loaded_rows, 2);
        assert_eq!(report.associations, 1);
        assert_eq!(report.unknown_regions, 1);
        assert_eq!(report.parse_errors, 2);
        assert_eq!(report.flagged_rows, 2);

        let talca = &purchases[0];
        assert_eq!(talca.region_code, 7);
        assert_eq!(talca.unit_price, 1000.0);
        assert_eq!(talca.value(), 3000.0);
        assert_eq!(talca.overpriced, Some(true));
        assert_eq!(purchases[1].region_code, 15);
        assert_eq!(purchases[1].overpriced, Some(false));
    }

    #[test]
    fn hierarchy_rows_resolve_ancestry() {
        let (index, report) = read_hierarchy(HIERARCHY.as_bytes()).unwrap();
        assert_eq!(report.total_rows, 4);
        assert_eq!(report.parse_errors, 1);
        assert_eq!(report.commodities, 3);
        assert_eq!(report.without_category, 1);

        let pen = index.ancestry("44121701").unwrap();
        assert_eq!(pen.class.name, "Instrumentos de escritura");
        assert_eq!(pen.category.as_ref().map(|c| c.id.as_str()), Some("7"));

        let unnamed = index.ancestry("99101501").unwrap();
        assert_eq!(unnamed.segment.name, "99000000");
        assert!(unnamed.category.is_none());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("purchases.csv");
        std::fs::write(&path, PURCHASES).unwrap();
        let (purchases, _) = load_purchases(&path).unwrap();
        assert_eq!(purchases.len(), 2);
        assert!(load_purchases(dir.path().join("missing.csv")).is_err());
    }
}
