//! Définition des tables de destination

use crate::config::CoordinateStrategy;

/// Type SQL d'une colonne
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Varchar(u16),
    Double,
}

/// Définition d'une colonne
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub unique: bool,
}

impl ColumnDef {
    fn text(name: &'static str, size: u16) -> Self {
        Self {
            name,
            kind: ColumnKind::Varchar(size),
            nullable: false,
            unique: false,
        }
    }

    fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    fn double(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Double,
            nullable: true,
            unique: false,
        }
    }

    fn sql(&self) -> String {
        let kind = match self.kind {
            ColumnKind::Varchar(size) => format!("VARCHAR({})", size),
            ColumnKind::Double => "DOUBLE PRECISION".to_string(),
        };
        let mut sql = format!("{} {}", self.name, kind);
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        sql
    }
}

/// Définition d'une table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<&'static str>,
    pub unique: Vec<Vec<&'static str>>,
}

impl TableDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Nom qualifié `schema.table`
    pub fn qualified(&self, schema: &str) -> String {
        format!("{}.{}", schema, self.name)
    }

    /// Requête CREATE TABLE
    pub fn create_sql(&self, schema: &str) -> String {
        let mut lines: Vec<String> = self.columns.iter().map(ColumnDef::sql).collect();
        lines.push(format!("PRIMARY KEY ({})", self.primary_key.join(", ")));
        for unique in &self.unique {
            lines.push(format!("UNIQUE ({})", unique.join(", ")));
        }

        format!(
            "CREATE TABLE {} (\n    {}\n)",
            self.qualified(schema),
            lines.join(",\n    ")
        )
    }

    /// Requête DROP TABLE
    pub fn drop_sql(&self, schema: &str) -> String {
        format!("DROP TABLE IF EXISTS {} CASCADE", self.qualified(schema))
    }
}

pub fn regions() -> TableDef {
    TableDef {
        name: "regions",
        columns: vec![
            ColumnDef::text("region", 2),
            ColumnDef::text("cheflieu", 5).unique(),
            ColumnDef::text("tncc", 1),
            ColumnDef::text("ncc", 70).unique(),
            ColumnDef::text("nccenr", 70),
        ],
        primary_key: vec!["region"],
        unique: Vec::new(),
    }
}

pub fn departements() -> TableDef {
    TableDef {
        name: "departements",
        columns: vec![
            ColumnDef::text("region", 2),
            ColumnDef::text("dep", 3),
            ColumnDef::text("cheflieu", 5).unique(),
            ColumnDef::text("tncc", 1),
            ColumnDef::text("ncc", 70).unique(),
            ColumnDef::text("nccenr", 70),
        ],
        primary_key: vec!["dep"],
        unique: Vec::new(),
    }
}

pub fn arrondissements() -> TableDef {
    TableDef {
        name: "arrondissements",
        columns: vec![
            ColumnDef::text("region", 2),
            ColumnDef::text("dep", 3),
            ColumnDef::text("ar", 1),
            ColumnDef::text("cheflieu", 5),
            ColumnDef::text("tncc", 1),
            ColumnDef::text("artmaj", 5).nullable(),
            ColumnDef::text("ncc", 70),
            ColumnDef::text("artmin", 5).nullable(),
            ColumnDef::text("nccenr", 70),
        ],
        primary_key: vec!["region", "dep", "ar"],
        unique: Vec::new(),
    }
}

pub fn cantons() -> TableDef {
    TableDef {
        name: "cantons",
        columns: vec![
            ColumnDef::text("region", 2),
            ColumnDef::text("dep", 3),
            ColumnDef::text("ar", 1).nullable(),
            ColumnDef::text("canton", 2),
            ColumnDef::text("typct", 1),
            ColumnDef::text("cheflieu", 5),
            ColumnDef::text("tncc", 1),
            ColumnDef::text("artmaj", 5).nullable(),
            ColumnDef::text("ncc", 70),
            ColumnDef::text("artmin", 5).nullable(),
            ColumnDef::text("nccenr", 70),
        ],
        primary_key: vec!["region", "dep", "canton"],
        unique: Vec::new(),
    }
}

/// Table des communes ; longitude/latitude selon la stratégie
pub fn communes(strategy: CoordinateStrategy) -> TableDef {
    let mut columns = vec![
        ColumnDef::text("cdc", 1),
        ColumnDef::text("cheflieu", 1),
        ColumnDef::text("reg", 2),
        ColumnDef::text("dep", 3),
        ColumnDef::text("com", 3),
        ColumnDef::text("ar", 1).nullable(),
        ColumnDef::text("ct", 2),
        ColumnDef::text("tncc", 1),
        ColumnDef::text("artmaj", 5).nullable(),
        ColumnDef::text("ncc", 70),
        ColumnDef::text("artmin", 5).nullable(),
        ColumnDef::text("nccenr", 70),
        ColumnDef::text("ci", 5),
        ColumnDef::text("cp", 5),
    ];
    if strategy.has_coordinates() {
        columns.push(ColumnDef::double("longitude"));
        columns.push(ColumnDef::double("latitude"));
    }

    TableDef {
        name: "communes",
        columns,
        primary_key: vec!["ci"],
        unique: vec![vec!["reg", "dep", "com"]],
    }
}

/// Les cinq tables, dans l'ordre de chargement
pub fn all_tables(strategy: CoordinateStrategy) -> Vec<TableDef> {
    vec![
        regions(),
        departements(),
        arrondissements(),
        cantons(),
        communes(strategy),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regions_create_sql() {
        let sql = regions().create_sql("public");
        assert!(sql.starts_with("CREATE TABLE public.regions ("));
        assert!(sql.contains("region VARCHAR(2) NOT NULL"));
        assert!(sql.contains("cheflieu VARCHAR(5) NOT NULL UNIQUE"));
        assert!(sql.contains("ncc VARCHAR(70) NOT NULL UNIQUE"));
        assert!(sql.contains("PRIMARY KEY (region)"));
    }

    #[test]
    fn test_communes_columns_follow_strategy() {
        let plain = communes(CoordinateStrategy::None);
        assert!(!plain.has_column("longitude"));
        assert!(!plain.has_column("latitude"));

        let geocoded = communes(CoordinateStrategy::Geocode);
        let longitude = geocoded.column("longitude").unwrap();
        assert_eq!(longitude.kind, ColumnKind::Double);
        assert!(longitude.nullable);
        assert!(geocoded.has_column("latitude"));
    }

    #[test]
    fn test_communes_keys() {
        let sql = communes(CoordinateStrategy::File).create_sql("insee");
        assert!(sql.contains("PRIMARY KEY (ci)"));
        assert!(sql.contains("UNIQUE (reg, dep, com)"));
        assert!(sql.contains("cp VARCHAR(5) NOT NULL"));
        assert!(sql.contains("artmin VARCHAR(5),"));
        assert!(sql.contains("latitude DOUBLE PRECISION,"));
    }

    #[test]
    fn test_cantons_composite_key() {
        let sql = cantons().create_sql("public");
        assert!(sql.contains("PRIMARY KEY (region, dep, canton)"));
        assert!(sql.contains("ar VARCHAR(1),"));
    }

    #[test]
    fn test_drop_sql() {
        assert_eq!(
            departements().drop_sql("public"),
            "DROP TABLE IF EXISTS public.departements CASCADE"
        );
    }

    #[test]
    fn test_table_order() {
        let names: Vec<&str> = all_tables(CoordinateStrategy::None)
            .iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(
            names,
            vec!["regions", "departements", "arrondissements", "cantons", "communes"]
        );
    }
}
