//! Raw cause-of-death labels to canonical ICD-style chapters
//!
//! The mapping doubles as the class space: the order in which chapters
//! first appear in the code book is the class order used by every
//! downstream stage, so class ids are stable across runs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// The PHMRC gold-standard code book: raw verbal-autopsy cause (lowercase)
/// to ICD-style chapter. Chapter order here defines the canonical class ids.
const PHMRC_ENTRIES: &[(&str, &str)] = &[
    ("diarrhea/dysentery", "Certain infectious and Parasitic Diseases"),
    ("other infectious diseases", "Certain infectious and Parasitic Diseases"),
    ("aids", "Certain infectious and Parasitic Diseases"),
    ("sepsis", "Certain infectious and Parasitic Diseases"),
    ("meningitis", "Certain infectious and Parasitic Diseases"),
    ("meningitis/sepsis", "Certain infectious and Parasitic Diseases"),
    ("malaria", "Certain infectious and Parasitic Diseases"),
    ("encephalitis", "Certain infectious and Parasitic Diseases"),
    ("measles", "Certain infectious and Parasitic Diseases"),
    ("hemorrhagic fever", "Certain infectious and Parasitic Diseases"),
    ("tb", "Certain infectious and Parasitic Diseases"),
    ("leukemia/lymphomas", "Neoplasms"),
    ("colorectal cancer", "Neoplasms"),
    ("lung cancer", "Neoplasms"),
    ("cervical cancer", "Neoplasms"),
    ("breast cancer", "Neoplasms"),
    ("stomach cancer", "Neoplasms"),
    ("prostate cancer", "Neoplasms"),
    ("esophageal cancer", "Neoplasms"),
    ("other cancers", "Neoplasms"),
    ("diabetes", "Endocrine or Nutritional and Metabolic Diseases"),
    ("other non-communicable diseases", "Endocrine or Nutritional and Metabolic Diseases"),
    ("epilepsy", "Diseases of the Nervous System"),
    ("stroke", "Diseases of the circulatory system"),
    ("acute myocardial infarction", "Diseases of the circulatory system"),
    ("other cardiovascular diseases", "Diseases of the circulatory system"),
    ("pneumonia", "Diseases of Respiratory System"),
    ("asthma", "Diseases of Respiratory System"),
    ("copd", "Diseases of Respiratory System"),
    ("cirrhosis", "Diseases of the Digestive System"),
    ("other digestive diseases", "Diseases of the Digestive System"),
    ("renal failure", "Diseases of the Genitourinary System"),
    ("preterm delivery", "Pregnancy or childbirth and the puerperium"),
    ("stillbirth", "Pregnancy or childbirth and the puerperium"),
    ("maternal", "Pregnancy or childbirth and the puerperium"),
    ("birth asphyxia", "Pregnancy or childbirth and the puerperium"),
    ("other defined causes of child deaths", "Pregnancy or childbirth and the puerperium"),
    ("congenital malformations", "Congenital Malformations"),
    ("congenital malformation", "Congenital Malformations"),
    ("bite of venomous animal", "Injury or Poisoning and External Causes"),
    ("poisonings", "Injury or Poisoning and External Causes"),
    ("road traffic", "External Causes of Morbidity and Mortality"),
    ("falls", "External Causes of Morbidity and Mortality"),
    ("homicide", "External Causes of Morbidity and Mortality"),
    ("fires", "External Causes of Morbidity and Mortality"),
    ("drowning", "External Causes of Morbidity and Mortality"),
    ("suicide", "External Causes of Morbidity and Mortality"),
    ("violent death", "External Causes of Morbidity and Mortality"),
    ("other injuries", "External Causes of Morbidity and Mortality"),
];

/// Lookup table from raw labels to canonical categories, plus the ordered
/// category list the table induces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryMap {
    map: HashMap<String, String>,
    categories: Vec<String>,
}

impl CategoryMap {
    /// Build from `(raw_label, category)` pairs. Keys are lowercased;
    /// categories keep first-appearance order.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let mut map = HashMap::new();
        let mut categories: Vec<String> = Vec::new();

        for (raw, category) in entries {
            let category = category.into();
            if !categories.contains(&category) {
                categories.push(category.clone());
            }
            map.insert(raw.into().to_lowercase(), category);
        }

        Self { map, categories }
    }

    /// The built-in PHMRC verbal-autopsy code book (12 chapters).
    pub fn phmrc() -> Self {
        Self::from_entries(PHMRC_ENTRIES.iter().copied())
    }

    /// Load a two-column CSV code book: `raw_label,category` with a header.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open category map {}", path.display()))?;

        let mut entries = Vec::new();
        for (i, result) in reader.records().enumerate() {
            let row = result
                .with_context(|| format!("failed to read category map {}", path.display()))?;
            let raw = row
                .get(0)
                .with_context(|| format!("category map row {} has no label column", i + 1))?;
            let category = row
                .get(1)
                .with_context(|| format!("category map row {} has no category column", i + 1))?;
            entries.push((raw.trim().to_string(), category.trim().to_string()));
        }

        let map = Self::from_entries(entries);
        if map.is_empty() {
            anyhow::bail!("category map {} has no entries", path.display());
        }
        Ok(map)
    }

    /// Canonical category for a lowercase raw label, if mapped.
    pub fn lookup(&self, raw_label: &str) -> Option<&str> {
        self.map.get(raw_label).map(String::as_str)
    }

    /// Ordered canonical categories (the class-id space).
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_phmrc_lookup() {
        let map = CategoryMap::phmrc();
        assert_eq!(
            map.lookup("malaria"),
            Some("Certain infectious and Parasitic Diseases")
        );
        assert_eq!(map.lookup("stroke"), Some("Diseases of the circulatory system"));
        assert_eq!(map.lookup("hypertension"), None);
    }

    #[test]
    fn test_phmrc_category_order() {
        let map = CategoryMap::phmrc();
        let categories = map.categories();

        assert_eq!(categories.len(), 12);
        assert_eq!(categories[0], "Certain infectious and Parasitic Diseases");
        assert_eq!(categories[1], "Neoplasms");
        assert_eq!(categories[11], "External Causes of Morbidity and Mortality");
    }

    #[test]
    fn test_from_entries_lowercases_keys() {
        let map = CategoryMap::from_entries(vec![("Sepsis", "Infectious")]);
        assert_eq!(map.lookup("sepsis"), Some("Infectious"));
        assert_eq!(map.lookup("Sepsis"), None);
    }

    #[test]
    fn test_from_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cause,chapter").unwrap();
        writeln!(file, "malaria,Infectious").unwrap();
        writeln!(file, "stroke,Circulatory").unwrap();
        writeln!(file, "asthma,Respiratory").unwrap();
        file.flush().unwrap();

        let map = CategoryMap::from_csv(file.path()).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.lookup("stroke"), Some("Circulatory"));
        assert_eq!(
            map.categories(),
            &["Infectious", "Circulatory", "Respiratory"]
        );
    }

    #[test]
    fn test_from_csv_empty_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cause,chapter").unwrap();
        file.flush().unwrap();

        assert!(CategoryMap::from_csv(file.path()).is_err());
    }
}
