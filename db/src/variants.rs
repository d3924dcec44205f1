//! Variant lookups over the `variants` table, built on the query builder.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::Value;
use crate::client::Client;
use crate::error::DbError;
use crate::query_builder::{Operator, QueryBuilder, SortDirection};
use crate::types::PaginatedResult;

pub const DEFAULT_PAGE_SIZE: u64 = 50;

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DbError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(DbError::invalid_config(format!(
                        concat!("Unknown ", stringify!($name), ": {}"),
                        s
                    ))),
                }
            }
        }

        impl From<$name> for Value {
            fn from(v: $name) -> Self {
                Value::from(v.as_str())
            }
        }
    };
}

string_enum!(VariantType {
    Snv => "SNV",
    Insertion => "INSERTION",
    Deletion => "DELETION",
    Indel => "INDEL",
    Cnv => "CNV",
    Sv => "SV",
});

string_enum!(ClinicalSignificance {
    Pathogenic => "PATHOGENIC",
    LikelyPathogenic => "LIKELY_PATHOGENIC",
    Uncertain => "UNCERTAIN",
    LikelyBenign => "LIKELY_BENIGN",
    Benign => "BENIGN",
});

/// One called variant in one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: String,
    pub chromosome: String,
    /// 1-based.
    pub position: i64,
    pub reference: String,
    pub alternate: String,
    pub variant_type: VariantType,
    pub sample_id: String,
    #[serde(default)]
    pub gene: Option<String>,
    #[serde(default)]
    pub ensembl_gene_id: Option<String>,
    #[serde(default)]
    pub consequence: Option<String>,
    #[serde(default)]
    pub clinical_significance: Option<ClinicalSignificance>,
    #[serde(default)]
    pub population_frequency: Option<f64>,
    #[serde(default)]
    pub cadd_score: Option<f64>,
    #[serde(default)]
    pub revel_score: Option<f64>,
    #[serde(default)]
    pub genotype: Option<String>,
    #[serde(default)]
    pub quality: Option<f64>,
    #[serde(default)]
    pub depth: Option<i64>,
}

/// Inclusive genomic interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub chromosome: String,
    pub start: i64,
    pub end: i64,
}

impl Region {
    pub fn new(chromosome: impl Into<String>, start: i64, end: i64) -> Self {
        Self {
            chromosome: chromosome.into(),
            start,
            end,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeneRef {
    Symbol(String),
    EnsemblId(String),
}

/// Combined variant filter. Empty lists and `None` bounds do not filter.
#[derive(Debug, Clone, Default)]
pub struct VariantFilter {
    pub region: Option<Region>,
    pub gene: Option<GeneRef>,
    pub variant_types: Vec<VariantType>,
    pub clinical_significance: Vec<ClinicalSignificance>,
    pub min_population_frequency: Option<f64>,
    pub max_population_frequency: Option<f64>,
    pub min_cadd_score: Option<f64>,
    pub max_cadd_score: Option<f64>,
    pub min_revel_score: Option<f64>,
    pub max_revel_score: Option<f64>,
    pub min_quality: Option<f64>,
    pub min_depth: Option<i64>,
    pub sample_ids: Vec<String>,
    pub genotypes: Vec<String>,
    pub consequences: Vec<String>,
    /// Defaults to chromosome, then position.
    pub sort_by: Option<(String, SortDirection)>,
}

pub struct VariantQueryService {
    client: Arc<Client>,
    table: String,
}

impl VariantQueryService {
    pub fn new(client: Arc<Client>) -> Self {
        Self::with_table(client, "variants")
    }

    pub fn with_table(client: Arc<Client>, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    fn builder(&self) -> QueryBuilder<'_> {
        self.client.table(&self.table)
    }

    pub async fn query_by_region(
        &self,
        region: &Region,
        sample_ids: &[String],
    ) -> Result<Vec<Variant>, DbError> {
        validate_region(region)?;
        let builder = with_samples(with_region(self.builder(), region), sample_ids);
        builder.fetch_as().await
    }

    pub async fn query_by_gene(
        &self,
        gene: &GeneRef,
        sample_ids: &[String],
    ) -> Result<Vec<Variant>, DbError> {
        let builder = with_samples(with_gene(self.builder(), gene), sample_ids);
        builder.fetch_as().await
    }

    /// One page of matching variants. Rows decode into [`Variant`] with
    /// [`PaginatedResult::decode`].
    pub async fn query_variants(
        &self,
        filter: &VariantFilter,
        page: u64,
        page_size: u64,
    ) -> Result<PaginatedResult, DbError> {
        let builder = self.filtered(filter)?;
        let builder = match &filter.sort_by {
            Some((column, direction)) => builder.order_by(column, *direction),
            None => builder
                .order_by("chromosome", SortDirection::Asc)
                .order_by("position", SortDirection::Asc),
        };
        builder.paginate(page, page_size).await
    }

    pub async fn count_variants(&self, filter: &VariantFilter) -> Result<u64, DbError> {
        self.filtered(filter)?.get_count().await
    }

    /// Distinct values of one column, in engine order.
    pub async fn distinct_values(&self, field: &str) -> Result<Vec<Value>, DbError> {
        let result = self
            .builder()
            .select([field])
            .group_by([field])
            .order_by(field, SortDirection::Asc)
            .execute()
            .await?;
        Ok(result
            .into_rows()
            .into_iter()
            .map(|row| row.get_index(0).cloned().unwrap_or(Value::Null))
            .collect())
    }

    fn filtered(&self, filter: &VariantFilter) -> Result<QueryBuilder<'_>, DbError> {
        let mut b = self.builder();
        if let Some(region) = &filter.region {
            validate_region(region)?;
            b = with_region(b, region);
        }
        if let Some(gene) = &filter.gene {
            b = with_gene(b, gene);
        }
        if !filter.variant_types.is_empty() {
            b = b.where_in("variantType", filter.variant_types.iter().copied());
        }
        if !filter.clinical_significance.is_empty() {
            b = b.where_in(
                "clinicalSignificance",
                filter.clinical_significance.iter().copied(),
            );
        }

        let bounds = [
            ("populationFrequency", Operator::Ge, filter.min_population_frequency),
            ("populationFrequency", Operator::Le, filter.max_population_frequency),
            ("caddScore", Operator::Ge, filter.min_cadd_score),
            ("caddScore", Operator::Le, filter.max_cadd_score),
            ("revelScore", Operator::Ge, filter.min_revel_score),
            ("revelScore", Operator::Le, filter.max_revel_score),
            ("quality", Operator::Ge, filter.min_quality),
        ];
        for (column, op, bound) in bounds {
            if let Some(bound) = bound {
                b = b.where_(column, op, bound);
            }
        }
        if let Some(depth) = filter.min_depth {
            b = b.where_("depth", Operator::Ge, depth);
        }

        b = with_samples(b, &filter.sample_ids);
        if !filter.genotypes.is_empty() {
            b = b.where_in("genotype", filter.genotypes.iter().cloned());
        }
        if !filter.consequences.is_empty() {
            b = b.where_in("consequence", filter.consequences.iter().cloned());
        }
        Ok(b)
    }
}

fn validate_region(region: &Region) -> Result<(), DbError> {
    if region.start > region.end {
        return Err(DbError::invalid_config(format!(
            "Region start {} is after end {}",
            region.start, region.end
        )));
    }
    Ok(())
}

fn with_region<'a>(builder: QueryBuilder<'a>, region: &Region) -> QueryBuilder<'a> {
    builder
        .where_("chromosome", Operator::Eq, region.chromosome.as_str())
        .and("position", Operator::Ge, region.start)
        .and("position", Operator::Le, region.end)
}

fn with_gene<'a>(builder: QueryBuilder<'a>, gene: &GeneRef) -> QueryBuilder<'a> {
    match gene {
        GeneRef::Symbol(symbol) => builder.where_("gene", Operator::Eq, symbol.as_str()),
        GeneRef::EnsemblId(id) => builder.where_("ensemblGeneId", Operator::Eq, id.as_str()),
    }
}

fn with_samples<'a>(builder: QueryBuilder<'a>, sample_ids: &[String]) -> QueryBuilder<'a> {
    if sample_ids.is_empty() {
        builder
    } else {
        builder.where_in("sampleId", sample_ids.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::test_utils::{raw_result, MockEngine};
    use rstest::rstest;

    async fn service(engine: &MockEngine) -> VariantQueryService {
        let client = Arc::new(Client::with_engine(
            ClientConfig::default(),
            Arc::new(engine.clone()),
        ));
        client.initialize().await.unwrap();
        VariantQueryService::new(client)
    }

    #[rstest]
    #[case("snv", VariantType::Snv)]
    #[case("INDEL", VariantType::Indel)]
    fn test_variant_type_parse(#[case] input: &str, #[case] expected: VariantType) {
        assert_eq!(input.parse::<VariantType>().unwrap(), expected);
    }

    #[rstest]
    fn test_unknown_significance_is_rejected() {
        let err = "SOMEWHAT_BAD".parse::<ClinicalSignificance>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: Unknown ClinicalSignificance: SOMEWHAT_BAD"
        );
    }

    #[rstest]
    fn test_enums_serialize_as_text() {
        assert_eq!(serde_json::to_value(VariantType::Indel).unwrap(), "INDEL");
        assert_eq!(
            serde_json::to_value(ClinicalSignificance::LikelyBenign).unwrap(),
            "LIKELY_BENIGN"
        );
        assert_eq!(ClinicalSignificance::ALL.len(), 5);
        assert_eq!(Value::from(VariantType::Cnv), Value::from("CNV"));
    }

    #[rstest]
    #[tokio::test]
    async fn test_query_by_region_binds_interval_and_samples() {
        let engine = MockEngine::new().with_responder(|_, _| {
            Ok(raw_result(
                &["id", "chromosome", "position", "reference", "alternate", "variantType", "sampleId"],
                vec![vec![
                    Value::from("v1"),
                    Value::from("chr17"),
                    Value::Int(43_044_300),
                    Value::from("A"),
                    Value::from("G"),
                    Value::from("SNV"),
                    Value::from("S1"),
                ]],
            ))
        });
        let variants = service(&engine).await;

        let found = variants
            .query_by_region(
                &Region::new("chr17", 43_044_295, 43_125_483),
                &["S1".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].variant_type, VariantType::Snv);
        assert_eq!(found[0].gene, None);

        let (sql, params) = &engine.executed()[0];
        assert_eq!(
            sql,
            "SELECT * FROM variants WHERE chromosome = $1 AND position >= $2 AND position <= $3 AND sampleId IN ($4)"
        );
        assert_eq!(
            params,
            &vec![
                Value::from("chr17"),
                Value::Int(43_044_295),
                Value::Int(43_125_483),
                Value::from("S1"),
            ]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_inverted_region_is_rejected() {
        let engine = MockEngine::new();
        let variants = service(&engine).await;
        let err = variants
            .query_by_region(&Region::new("chr1", 200, 100), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidConfig { .. }));
        assert!(engine.executed().is_empty());
    }

    #[rstest]
    #[case(GeneRef::Symbol("BRCA1".into()), "gene = $1")]
    #[case(GeneRef::EnsemblId("ENSG00000012048".into()), "ensemblGeneId = $1")]
    #[tokio::test]
    async fn test_query_by_gene(#[case] gene: GeneRef, #[case] predicate: &str) {
        let engine = MockEngine::new();
        let variants = service(&engine).await;
        variants.query_by_gene(&gene, &[]).await.unwrap();
        assert_eq!(
            engine.executed_sql()[0],
            format!("SELECT * FROM variants WHERE {predicate}")
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_query_variants_default_sort_and_filters() {
        let engine = MockEngine::new().with_responder(|sql, _| {
            if sql.contains("COUNT(*)") {
                Ok(raw_result(&["count"], vec![vec![Value::Int(120)]]))
            } else {
                Ok(raw_result(&["id"], vec![]))
            }
        });
        let variants = service(&engine).await;
        let filter = VariantFilter {
            variant_types: vec![VariantType::Snv, VariantType::Indel],
            max_population_frequency: Some(0.01),
            min_depth: Some(20),
            ..Default::default()
        };

        let page = variants
            .query_variants(&filter, 2, DEFAULT_PAGE_SIZE)
            .await
            .unwrap();
        assert_eq!(page.total, 120);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next_page);

        let executed = engine.executed();
        assert_eq!(
            executed[0].0,
            "SELECT COUNT(*) AS count FROM variants WHERE variantType IN ($1, $2) AND populationFrequency <= $3 AND depth >= $4"
        );
        assert_eq!(
            executed[1].0,
            "SELECT * FROM variants WHERE variantType IN ($1, $2) AND populationFrequency <= $3 AND depth >= $4 \
             ORDER BY chromosome ASC, position ASC LIMIT 50 OFFSET 50"
        );
        assert_eq!(
            executed[1].1,
            vec![
                Value::from("SNV"),
                Value::from("INDEL"),
                Value::Float(0.01),
                Value::Int(20)
            ]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_distinct_values() {
        let engine = MockEngine::new().with_responder(|_, _| {
            Ok(raw_result(
                &["chromosome"],
                vec![vec![Value::from("chr1")], vec![Value::from("chrX")]],
            ))
        });
        let variants = service(&engine).await;
        let values = variants.distinct_values("chromosome").await.unwrap();
        assert_eq!(values, vec![Value::from("chr1"), Value::from("chrX")]);
        assert_eq!(
            engine.executed_sql()[0],
            "SELECT chromosome FROM variants GROUP BY chromosome ORDER BY chromosome ASC"
        );
    }
}
