//! REST portal adapter (spec C1a / §4.1): the PNCP-shaped national
//! contracting-proposals API. National scope is always fetched on the
//! wire; `region_code` and keyword filters are applied locally against
//! a single 24h-cached "raw national page set" (spec §4.1 cache
//! policy), since the upstream rejects certain region filters with
//! HTTP 422.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use licita_domain::constants::{
    DEFAULT_SEARCH_WINDOW_FUTURE_DAYS, DEFAULT_SEARCH_WINDOW_PAST_DAYS, REST_FETCH_BATCH_SIZE,
    REST_FETCH_BATCH_SLEEP_MS, REST_FETCH_MAX_EMPTY_BATCHES, REST_FETCH_PAGE_FULL_SIZE,
    SOURCE_CACHE_TTL_SECONDS,
};
use licita_domain::entities::{Opportunity, OpportunityItem};
use licita_domain::error::{Error, Result};
use licita_domain::ports::{CacheProvider, ProviderAdapter};
use licita_domain::utils::text::normalize;
use licita_domain::value_objects::{MaterialOrService, SearchFilters};

use crate::http::{build_client, HostLimiter};

/// Fixed modality code the upstream restricts this adapter to (spec
/// §9 Open Question: whether other modalities are in scope is unclear
/// upstream; preserved as a fixed, overridable configuration value).
const DEFAULT_MODALITY_CODE: &str = "8";

const GZIP_THRESHOLD_BYTES: usize = 512 * 1024;

const MAX_PAGES: usize = 200;

/// Runtime configuration for [`RestPortalAdapter`].
#[derive(Debug, Clone)]
pub struct RestPortalConfig {
    pub base_url: String,
    pub detail_base_url: String,
    pub modality_code: String,
    pub per_host_concurrency: usize,
    pub request_timeout: Duration,
}

impl Default for RestPortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://pncp.gov.br/api/consulta".to_owned(),
            detail_base_url: "https://pncp.gov.br/api/consulta/v1".to_owned(),
            modality_code: DEFAULT_MODALITY_CODE.to_owned(),
            per_host_concurrency: 8,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// The upstream's control-number identity, parsed out of `external_id`
/// so detail/items URLs can be rebuilt without a second round trip
/// (SPEC_FULL supplement: `pncp_adapter.py` control-number parsing).
///
/// Format: `TAX_ID-MOD-SEQ/YEAR` — 14-digit tax id, 3-digit zero-padded
/// modality, numeric sequence, 4-digit year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestControlNumber {
    pub tax_id: String,
    pub modality: String,
    pub sequence: String,
    pub year: String,
}

impl RestControlNumber {
    #[must_use]
    pub fn parse(external_id: &str) -> Option<Self> {
        let (body, year) = external_id.split_once('/')?;
        let mut parts = body.splitn(3, '-');
        let tax_id = parts.next()?.to_owned();
        let modality = parts.next()?.to_owned();
        let sequence = parts.next()?.to_owned();
        if tax_id.is_empty() || sequence.is_empty() || year.is_empty() {
            return None;
        }
        Some(Self { tax_id, modality, sequence, year: year.to_owned() })
    }

    #[must_use]
    pub fn to_detail_path(&self, base_url: &str) -> String {
        format!("{base_url}/orgaos/{}/compras/{}/{}", self.tax_id, self.year, self.sequence)
    }

    #[must_use]
    pub fn to_items_path(&self, base_url: &str) -> String {
        format!("{}/itens", self.to_detail_path(base_url))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
struct RawEntity {
    #[serde(rename = "razaoSocial")]
    razao_social: Option<String>,
    #[serde(rename = "cnpj")]
    cnpj: Option<String>,
    #[serde(rename = "ufSigla")]
    uf_sigla: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
struct RawUnit {
    #[serde(rename = "nomeUnidade")]
    nome_unidade: Option<String>,
    #[serde(rename = "municipioNome")]
    municipio_nome: Option<String>,
    #[serde(rename = "ufSigla")]
    uf_sigla: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
struct RawLicitacao {
    #[serde(rename = "numeroControlePNCP")]
    numero_controle: String,
    #[serde(rename = "objetoCompra")]
    objeto_compra: Option<String>,
    #[serde(rename = "informacaoComplementar")]
    informacao_complementar: Option<String>,
    #[serde(rename = "objetoDetalhado")]
    objeto_detalhado: Option<String>,
    #[serde(rename = "valorTotalEstimado")]
    valor_total_estimado: Option<Decimal>,
    #[serde(rename = "dataAberturaProposta")]
    data_abertura_proposta: Option<String>,
    #[serde(rename = "dataEncerramentoProposta")]
    data_encerramento_proposta: Option<String>,
    #[serde(rename = "dataPublicacaoPncp")]
    data_publicacao_pncp: Option<String>,
    #[serde(rename = "orgaoEntidade")]
    orgao_entidade: Option<RawEntity>,
    #[serde(rename = "unidadeOrgao")]
    unidade_orgao: Option<RawUnit>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(default)]
    data: Vec<RawLicitacao>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(rename = "numeroItem")]
    numero_item: Option<i32>,
    #[serde(rename = "descricao")]
    descricao: Option<String>,
    #[serde(rename = "quantidade")]
    quantidade: Option<Decimal>,
    #[serde(rename = "unidadeMedida")]
    unidade_medida: Option<String>,
    #[serde(rename = "valorUnitarioEstimado")]
    valor_unitario_estimado: Option<Decimal>,
    #[serde(rename = "materialOuServico")]
    material_ou_servico: Option<String>,
    #[serde(rename = "ncm")]
    ncm: Option<String>,
    #[serde(rename = "aplicabilidadeMargemPreferenciaNormal")]
    me_epp: Option<bool>,
}

/// A deserializable snapshot of one cached national fetch (spec §4.1:
/// "a single cache key identifies the raw national page set").
#[derive(Debug, Serialize, Deserialize)]
struct RawNationalSnapshot {
    rows: Vec<RawLicitacao>,
}

pub struct RestPortalAdapter {
    client: reqwest::Client,
    limiter: HostLimiter,
    cache: Arc<dyn CacheProvider>,
    config: RestPortalConfig,
}

impl RestPortalAdapter {
    #[must_use]
    pub fn new(config: RestPortalConfig, cache: Arc<dyn CacheProvider>) -> Self {
        let client = build_client(config.request_timeout);
        let limiter = HostLimiter::new(config.per_host_concurrency);
        Self { client, limiter, cache, config }
    }

    fn date_window(&self) -> (NaiveDate, NaiveDate) {
        let today = chrono::Local::now().date_naive();
        (
            today - chrono::Duration::days(DEFAULT_SEARCH_WINDOW_PAST_DAYS),
            today + chrono::Duration::days(DEFAULT_SEARCH_WINDOW_FUTURE_DAYS),
        )
    }

    fn national_cache_key(&self) -> String {
        let (from, to) = self.date_window();
        format!(
            "rest_portal:national:{}:{}:{}",
            from, to, self.config.modality_code
        )
    }

    /// Fetches the full national dataset for the current date window and
    /// modality, transparently consulting the 24h cache first (spec
    /// §4.1 "Cache policy").
    async fn fetch_national_set(&self) -> Result<Vec<RawLicitacao>> {
        let key = self.national_cache_key();

        if let Ok(Some(bytes)) = self.cache.get(&key).await {
            if let Some(rows) = Self::decode_snapshot(&bytes) {
                return Ok(rows);
            }
        }

        let rows = self.fetch_national_set_paginated().await?;

        if let Ok(bytes) = Self::encode_snapshot(&rows) {
            let _ = self.cache.set(&key, bytes, Some(SOURCE_CACHE_TTL_SECONDS)).await;
        }

        Ok(rows)
    }

    fn encode_snapshot(rows: &[RawLicitacao]) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(&RawNationalSnapshot { rows: rows.to_vec() })?;
        if json.len() > GZIP_THRESHOLD_BYTES {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&json).map_err(Error::Io)?;
            encoder.finish().map_err(Error::Io)
        } else {
            Ok(json)
        }
    }

    fn decode_snapshot(bytes: &[u8]) -> Option<Vec<RawLicitacao>> {
        // gzip magic bytes: 0x1f 0x8b
        let json_bytes: Vec<u8> = if bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b {
            let mut decoder = GzDecoder::new(bytes);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).ok()?;
            out
        } else {
            bytes.to_vec()
        };
        serde_json::from_slice::<RawNationalSnapshot>(&json_bytes).ok().map(|s| s.rows)
    }

    /// Parallel paginated fetch (spec §5 "REST adapter's batch-of-20
    /// pattern"): pages grouped into batches of
    /// [`REST_FETCH_BATCH_SIZE`], dispatched to a worker pool of the
    /// same size, paced by [`REST_FETCH_BATCH_SLEEP_MS`] between
    /// batches.
    async fn fetch_national_set_paginated(&self) -> Result<Vec<RawLicitacao>> {
        let (from, to) = self.date_window();
        let mut all_rows = Vec::new();
        let mut seen_ids = std::collections::HashSet::new();
        let mut empty_batches = 0u32;
        let mut page = 1usize;

        'batches: while page <= MAX_PAGES {
            let batch_end = (page + REST_FETCH_BATCH_SIZE - 1).min(MAX_PAGES);
            let pages: Vec<usize> = (page..=batch_end).collect();

            let fetches = pages.iter().map(|&p| {
                let client = self.client.clone();
                let limiter = self.limiter.clone();
                let url = format!("{}/contratacoes/proposta", self.config.base_url);
                let modality = self.config.modality_code.clone();
                async move {
                    limiter
                        .run(|| async {
                            fetch_page(&client, &url, from, to, p, &modality).await
                        })
                        .await
                }
            });

            let results = futures::future::join_all(fetches).await;
            let mut batch_had_rows = false;
            let mut batch_saw_partial_page = false;

            for result in results {
                match result {
                    Ok(rows) => {
                        if rows.len() < REST_FETCH_PAGE_FULL_SIZE {
                            batch_saw_partial_page = true;
                        }
                        for row in rows {
                            if seen_ids.insert(row.numero_controle.clone()) {
                                batch_had_rows = true;
                                all_rows.push(row);
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "rest_portal page fetch failed, continuing batch");
                    }
                }
            }

            if batch_had_rows {
                empty_batches = 0;
            } else {
                empty_batches += 1;
                if empty_batches >= REST_FETCH_MAX_EMPTY_BATCHES {
                    break 'batches;
                }
            }
            if batch_saw_partial_page {
                break 'batches;
            }

            page = batch_end + 1;
            tokio::time::sleep(Duration::from_millis(REST_FETCH_BATCH_SLEEP_MS)).await;
        }

        Ok(all_rows)
    }

    fn matches_keywords(row: &RawLicitacao, terms: &[String]) -> bool {
        if terms.is_empty() {
            return true;
        }
        let haystack = normalize(&format!(
            "{} {} {}",
            row.objeto_compra.as_deref().unwrap_or_default(),
            row.objeto_detalhado.as_deref().unwrap_or_default(),
            row.informacao_complementar.as_deref().unwrap_or_default(),
        ));
        terms.iter().any(|t| haystack.contains(&normalize(t)))
    }

    fn matches_region(row: &RawLicitacao, region_code: &str) -> bool {
        let uf = row
            .unidade_orgao
            .as_ref()
            .and_then(|u| u.uf_sigla.as_deref())
            .or_else(|| row.orgao_entidade.as_ref().and_then(|o| o.uf_sigla.as_deref()));
        uf.is_some_and(|uf| uf.eq_ignore_ascii_case(region_code))
    }

    /// Applies keyword/region/value/date filters locally against an
    /// already-fetched national set (spec §4.1: "on cache hit, local
    /// filters are applied in-memory").
    fn apply_local_filters(rows: Vec<RawLicitacao>, filters: &SearchFilters) -> Vec<RawLicitacao> {
        let terms = filters.keyword_terms();
        rows.into_iter()
            .filter(|row| Self::matches_keywords(row, &terms))
            .filter(|row| match &filters.region_code {
                Some(region) => Self::matches_region(row, region),
                None => true,
            })
            .filter(|row| match (row.valor_total_estimado, filters.min_value) {
                (Some(v), Some(min)) => v >= min,
                _ => true,
            })
            .filter(|row| match (row.valor_total_estimado, filters.max_value) {
                (Some(v), Some(max)) => v <= max,
                _ => true,
            })
            .filter(|row| {
                let published = row.data_publicacao_pncp.as_deref().and_then(parse_pncp_date);
                match (published, filters.publication_date_from) {
                    (Some(d), Some(from)) => d >= from,
                    _ => true,
                }
            })
            .filter(|row| {
                let published = row.data_publicacao_pncp.as_deref().and_then(parse_pncp_date);
                match (published, filters.publication_date_to) {
                    (Some(d), Some(to)) => d <= to,
                    _ => true,
                }
            })
            .filter(|row| {
                let deadline = row.data_encerramento_proposta.as_deref().and_then(parse_pncp_date);
                match (deadline, filters.submission_deadline_from) {
                    (Some(d), Some(from)) => d >= from,
                    _ => true,
                }
            })
            .filter(|row| {
                let deadline = row.data_encerramento_proposta.as_deref().and_then(parse_pncp_date);
                match (deadline, filters.submission_deadline_to) {
                    (Some(d), Some(to)) => d <= to,
                    _ => true,
                }
            })
            .collect()
    }

    fn to_opportunity(&self, row: RawLicitacao) -> Opportunity {
        let title = row
            .objeto_compra
            .clone()
            .unwrap_or_else(|| row.extra.get("objetoContratacao").and_then(|v| v.as_str()).unwrap_or_default().to_owned());
        let description = row
            .informacao_complementar
            .clone()
            .or_else(|| row.objeto_detalhado.clone())
            .unwrap_or_default();

        let (city, region) = row
            .unidade_orgao
            .as_ref()
            .map(|u| (u.municipio_nome.clone(), u.uf_sigla.clone()))
            .unwrap_or((None, None));
        let region = region.or_else(|| row.orgao_entidade.as_ref().and_then(|o| o.uf_sigla.clone()));

        let procuring_entity_id = RestControlNumber::parse(&row.numero_controle)
            .map(|cn| cn.tax_id)
            .or_else(|| row.orgao_entidade.as_ref().and_then(|o| o.cnpj.clone()));

        Opportunity {
            provider_name: "rest_portal".to_owned(),
            external_id: row.numero_controle.clone(),
            title,
            description,
            estimated_value: row.valor_total_estimado,
            currency_code: "BRL".to_owned(),
            country_code: "BR".to_owned(),
            region_code: region,
            municipality: city,
            publication_date: row.data_publicacao_pncp.as_deref().and_then(parse_pncp_date),
            submission_deadline: row.data_encerramento_proposta.as_deref().and_then(parse_pncp_date),
            opening_date: row.data_abertura_proposta.as_deref().and_then(parse_pncp_date),
            procuring_entity_id,
            procuring_entity_name: row.orgao_entidade.as_ref().and_then(|o| o.razao_social.clone()),
            provider_specific_data: serde_json::Value::Object(row.extra),
            items: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

fn parse_pncp_date(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().map(|d| d.and_hms_opt(0, 0, 0).unwrap()))
}

async fn fetch_page(
    client: &reqwest::Client,
    url: &str,
    from: NaiveDate,
    to: NaiveDate,
    page: usize,
    modality: &str,
) -> Result<Vec<RawLicitacao>> {
    let response = client
        .get(url)
        .query(&[
            ("dataInicial", from.format("%Y%m%d").to_string()),
            ("dataFinal", to.format("%Y%m%d").to_string()),
            ("pagina", page.to_string()),
            ("tamanhoPagina", REST_FETCH_PAGE_FULL_SIZE.to_string()),
            ("codigoModalidadeContratacao", modality.to_string()),
        ])
        .send()
        .await
        .map_err(|e| Error::upstream_transient("rest_portal", e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let transient = status.is_server_error() || status.as_u16() == 429;
        return Err(Error::Upstream {
            provider: "rest_portal".to_owned(),
            message: format!("HTTP {status}"),
            transient,
        });
    }

    let page: RawPage = response
        .json()
        .await
        .map_err(|e| Error::upstream_permanent("rest_portal", format!("bad response shape: {e}")))?;
    Ok(page.data)
}

#[async_trait]
impl ProviderAdapter for RestPortalAdapter {
    async fn search(&self, filters: &SearchFilters) -> Result<Vec<Opportunity>> {
        let national = self.fetch_national_set().await?;
        let filtered = Self::apply_local_filters(national, filters);
        Ok(filtered.into_iter().map(|row| self.to_opportunity(row)).collect())
    }

    async fn get_details(&self, external_id: &str) -> Result<Option<Opportunity>> {
        let Some(control) = RestControlNumber::parse(external_id) else {
            return Ok(None);
        };
        let url = control.to_detail_path(&self.config.detail_base_url);

        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let row: RawLicitacao = response
                    .json()
                    .await
                    .map_err(|e| Error::upstream_permanent("rest_portal", e.to_string()))?;
                Ok(Some(self.to_opportunity(row)))
            }
            _ => {
                // Fall back to scanning the paginated national set
                // (spec §4.1: "On HTTP failure of detail fetch, fall
                // back to scanning the paginated list for the id.").
                let national = self.fetch_national_set().await?;
                Ok(national
                    .into_iter()
                    .find(|r| r.numero_controle == external_id)
                    .map(|row| self.to_opportunity(row)))
            }
        }
    }

    async fn get_items(&self, external_id: &str) -> Result<Vec<OpportunityItem>> {
        let control = RestControlNumber::parse(external_id)
            .ok_or_else(|| Error::invalid_argument(format!("malformed rest_portal external_id '{external_id}'")))?;
        let url = control.to_items_path(&self.config.detail_base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::upstream_transient("rest_portal", e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::upstream_permanent("rest_portal", format!("HTTP {}", response.status())));
        }
        let raw_items: Vec<RawItem> = response
            .json()
            .await
            .map_err(|e| Error::upstream_permanent("rest_portal", e.to_string()))?;

        Ok(raw_items
            .into_iter()
            .enumerate()
            .map(|(i, item)| OpportunityItem {
                item_number: item.numero_item.unwrap_or(i as i32 + 1),
                description: item.descricao.unwrap_or_default(),
                quantity: item.quantidade,
                unit: item.unidade_medida,
                unit_estimated_value: item.valor_unitario_estimado,
                material_or_service: match item.material_ou_servico.as_deref() {
                    Some(s) if s.eq_ignore_ascii_case("servico") || s.eq_ignore_ascii_case("serviço") => {
                        MaterialOrService::Service
                    }
                    _ => MaterialOrService::Material,
                },
                ncm_code: item.ncm,
                me_epp_exclusive: item.me_epp.unwrap_or(false),
            })
            .collect())
    }

    fn provider_name(&self) -> &str {
        "rest_portal"
    }

    fn metadata(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("modality_code".to_owned(), serde_json::Value::String(self.config.modality_code.clone()));
        map.insert("base_url".to_owned(), serde_json::Value::String(self.config.base_url.clone()));
        map
    }
}
