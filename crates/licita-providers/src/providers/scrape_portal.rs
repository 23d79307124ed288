//! HTML-scrape portal adapter (spec C1b / §4.1): an upstream that
//! exposes no API, only a results page whose `<form method="post">`
//! blocks each wrap one tender in a `<td class="tex3">` cell (SPEC_FULL
//! supplement: `test_comprasnet_html_parser_simple.py`'s
//! `find_advanced_licitacao_blocks`/`parse_html_licitacao_data`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use licita_domain::entities::{Opportunity, OpportunityItem};
use licita_domain::error::{Error, Result};
use licita_domain::ports::{CacheProvider, ProviderAdapter};
use licita_domain::utils::text::normalize;
use licita_domain::value_objects::{MaterialOrService, SearchFilters};

use crate::http::{build_client, HostLimiter};

static UASG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)C[oó]digo da UASG\s*:?\s*(\d+)").unwrap());
static PREGAO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Preg[aã]o Eletr[oô]nico N[ºo]\s*(\d+)/(\d+)").unwrap());
// `regex` (unlike `fancy-regex`, which the workspace doesn't depend on)
// has no lookahead support, so these two capture to end-of-string and
// `cut_before_next_label` truncates the match at the next known label
// line afterwards instead of stopping the regex engine there directly.
static OBJETO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)Objeto\s*:\s*(.+)").unwrap());
static EDITAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Edital a partir de\s*:\s*(.+)").unwrap());
static ENTREGA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Entrega da Proposta\s*:\s*(.+)").unwrap());
static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{2}/\d{2}/\d{4})").unwrap());
static ENDERECO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)Endere[cç]o\s*:\s*(.+)").unwrap());
static UF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([A-Z]{2})\)\s*$").unwrap());
static ONCLICK_ARG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"'([^']+)'").unwrap());

/// Fallback entity name for malformed blocks missing a `<b>` tag (spec
/// §9 Open Question: "behavior should degrade to 'Entidade não
/// identificada' rather than fail").
const UNKNOWN_ENTITY: &str = "Entidade não identificada";

/// Truncates a field captured to end-of-string at the next line that
/// starts one of ComprasNet's other known labels. `OBJETO_RE`/`ENDERECO_RE`
/// capture everything after their label since `regex` has no lookahead to
/// stop the match at the next label directly; this does that part in
/// plain code instead.
fn cut_before_next_label(captured: &str) -> &str {
    const LABELS: [&str; 4] = ["edital", "endere", "telefone", "entrega"];
    let mut cut = captured.len();
    for (offset, _) in captured.match_indices('\n') {
        let line_start = offset + 1;
        let line_end = captured[line_start..].find('\n').map_or(captured.len(), |i| line_start + i);
        let line = captured[line_start..line_end].trim_start().to_lowercase();
        if LABELS.iter().any(|label| line.starts_with(label)) {
            cut = offset;
            break;
        }
    }
    &captured[..cut]
}

#[derive(Debug, Clone)]
pub struct ScrapePortalConfig {
    pub results_url: String,
    pub item_fetch_base_url: String,
    pub per_host_concurrency: usize,
    pub request_timeout: Duration,
}

impl Default for ScrapePortalConfig {
    fn default() -> Self {
        Self {
            results_url: "https://www.comprasnet.gov.br/ConsultaLicitacoes/ConsLicitacao_Relacao.asp"
                .to_owned(),
            item_fetch_base_url: "https://www.comprasnet.gov.br".to_owned(),
            per_host_concurrency: 5,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// One parsed `<form>` block. Dates are kept as `DD/MM/YYYY` strings at
/// parse time and converted on demand, matching the upstream's display
/// format rather than an ISO one.
#[derive(Debug, Clone, Default)]
struct ScrapedTender {
    uasg: String,
    pregao_numero: String,
    pregao_ano: String,
    ministry: String,
    organ: String,
    entity_name: String,
    object_description: String,
    address: String,
    city: String,
    uf: String,
    publication_date: Option<String>,
    closing_date: Option<String>,
    items_onclick_arg: Option<String>,
    form_name: String,
}

impl ScrapedTender {
    fn external_id(&self) -> String {
        if !self.uasg.is_empty() && !self.pregao_numero.is_empty() {
            format!(
                "scrape_portal_{}_{}_{}",
                self.uasg, self.pregao_numero, self.pregao_ano
            )
        } else {
            format!("scrape_portal_{}", self.form_name)
        }
    }
}

pub struct ScrapePortalAdapter {
    client: reqwest::Client,
    limiter: HostLimiter,
    #[allow(dead_code)]
    cache: Arc<dyn CacheProvider>,
    config: ScrapePortalConfig,
}

impl ScrapePortalAdapter {
    #[must_use]
    pub fn new(config: ScrapePortalConfig, cache: Arc<dyn CacheProvider>) -> Self {
        let client = build_client(config.request_timeout);
        let limiter = HostLimiter::new(config.per_host_concurrency);
        Self { client, limiter, cache, config }
    }

    async fn fetch_results_page(&self) -> Result<String> {
        let client = self.client.clone();
        let url = self.config.results_url.clone();
        self.limiter
            .run(|| async move {
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| Error::upstream_transient("scrape_portal", e.to_string()))?;
                if !response.status().is_success() {
                    let status = response.status();
                    return Err(Error::Upstream {
                        provider: "scrape_portal".to_owned(),
                        message: format!("HTTP {status}"),
                        transient: status.is_server_error(),
                    });
                }
                response
                    .text()
                    .await
                    .map_err(|e| Error::upstream_permanent("scrape_portal", e.to_string()))
            })
            .await
    }

    /// Walks every `<form method="post">` block and parses the one
    /// `<td class="tex3">` data cell it contains into a [`ScrapedTender`].
    /// A malformed block is logged and skipped rather than aborting the
    /// whole page (spec §4.1: tolerant scraping).
    fn parse_tenders(html: &str) -> Vec<ScrapedTender> {
        let document = Html::parse_document(html);
        let form_selector = Selector::parse("form[method='post' i]").unwrap();
        let cell_selector = Selector::parse("td.tex3").unwrap();
        let bold_selector = Selector::parse("b").unwrap();
        let anchor_selector = Selector::parse("a").unwrap();
        let input_selector = Selector::parse("input").unwrap();

        let mut tenders = Vec::new();
        for (index, form) in document.select(&form_selector).enumerate() {
            let form_name = form
                .value()
                .attr("name")
                .map(str::to_owned)
                .unwrap_or_else(|| format!("Form{}", index + 1));

            let Some(cell) = form.select(&cell_selector).next() else {
                tracing::warn!(form = %form_name, "scrape_portal: no tex3 data cell in form");
                continue;
            };

            let cell_text: String = cell.text().collect::<Vec<_>>().join("\n");

            let (ministry, organ, entity_name) = cell
                .select(&bold_selector)
                .next()
                .map(|b| {
                    let lines: Vec<String> = b
                        .text()
                        .collect::<String>()
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty() && !l.contains("Código da UASG"))
                        .map(str::to_owned)
                        .collect();
                    let ministry = lines.first().cloned().unwrap_or_default();
                    let organ = lines.get(1).cloned().unwrap_or_default();
                    let entity = lines.last().cloned().unwrap_or_else(|| UNKNOWN_ENTITY.to_owned());
                    (ministry, organ, entity)
                })
                .unwrap_or_else(|| (String::new(), String::new(), UNKNOWN_ENTITY.to_owned()));

            let uasg = UASG_RE
                .captures(&cell_text)
                .map(|c| c[1].to_owned())
                .unwrap_or_default();
            let pregao = PREGAO_RE.captures(&cell_text);
            let pregao_numero = pregao.as_ref().map(|c| c[1].to_owned()).unwrap_or_default();
            let pregao_ano = pregao.as_ref().map(|c| c[2].to_owned()).unwrap_or_default();

            let object_description = OBJETO_RE
                .captures(&cell_text)
                .map(|c| cut_before_next_label(&c[1]).trim().to_owned())
                .unwrap_or_else(|| format!("Pregão Eletrônico ComprasNet #{}", index + 1));

            let publication_date = EDITAL_RE
                .captures(&cell_text)
                .and_then(|c| DATE_RE.captures(&c[1]))
                .map(|c| c[1].to_owned());
            let closing_date = ENTREGA_RE
                .captures(&cell_text)
                .and_then(|c| DATE_RE.captures(&c[1]))
                .map(|c| c[1].to_owned());

            let address = ENDERECO_RE
                .captures(&cell_text)
                .map(|c| cut_before_next_label(&c[1]).trim().to_owned())
                .unwrap_or_default();
            let uf = UF_RE.captures(&address).map(|c| c[1].to_owned()).unwrap_or_default();
            let city = address
                .rsplit('-')
                .nth(1)
                .map(|s| s.split('(').next().unwrap_or("").trim().to_owned())
                .unwrap_or_default();

            let items_onclick_arg = cell
                .select(&input_selector)
                .find(|el| el.value().attr("value") == Some("Itens e Download"))
                .and_then(|el| el.value().attr("onclick"))
                .and_then(|onclick| ONCLICK_ARG_RE.captures(onclick))
                .map(|c| c[1].to_owned());

            let _ = cell.select(&anchor_selector).count();

            tenders.push(ScrapedTender {
                uasg,
                pregao_numero,
                pregao_ano,
                ministry,
                organ,
                entity_name,
                object_description,
                address,
                city,
                uf,
                publication_date,
                closing_date,
                items_onclick_arg,
                form_name,
            });
        }
        tenders
    }

    fn parse_br_date(raw: &str) -> Option<NaiveDateTime> {
        NaiveDate::parse_from_str(raw, "%d/%m/%Y")
            .ok()
            .map(|d| d.and_hms_opt(0, 0, 0).unwrap())
    }

    fn to_opportunity(&self, tender: ScrapedTender) -> Opportunity {
        let mut data = serde_json::Map::new();
        data.insert("ministry".to_owned(), tender.ministry.clone().into());
        data.insert("organ".to_owned(), tender.organ.clone().into());
        data.insert("uasg".to_owned(), tender.uasg.clone().into());
        if let Some(arg) = &tender.items_onclick_arg {
            data.insert("items_onclick_arg".to_owned(), arg.clone().into());
        }

        Opportunity {
            provider_name: "scrape_portal".to_owned(),
            external_id: tender.external_id(),
            title: if tender.entity_name.is_empty() {
                tender.object_description.clone()
            } else {
                format!("{} - {}", tender.entity_name, tender.object_description)
            },
            description: tender.object_description,
            estimated_value: None,
            currency_code: "BRL".to_owned(),
            country_code: "BR".to_owned(),
            region_code: if tender.uf.is_empty() { None } else { Some(tender.uf) },
            municipality: if tender.city.is_empty() { None } else { Some(tender.city) },
            publication_date: tender.publication_date.as_deref().and_then(Self::parse_br_date),
            submission_deadline: tender.closing_date.as_deref().and_then(Self::parse_br_date),
            opening_date: tender.publication_date.as_deref().and_then(Self::parse_br_date),
            procuring_entity_id: if tender.uasg.is_empty() { None } else { Some(tender.uasg) },
            procuring_entity_name: if tender.entity_name.is_empty() { None } else { Some(tender.entity_name) },
            provider_specific_data: serde_json::Value::Object(data),
            items: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    fn matches_filters(opportunity: &Opportunity, filters: &SearchFilters) -> bool {
        let terms = filters.keyword_terms();
        if !terms.is_empty() {
            let haystack = normalize(&format!("{} {}", opportunity.title, opportunity.description));
            if !terms.iter().any(|t| haystack.contains(&normalize(t))) {
                return false;
            }
        }
        if let Some(region) = &filters.region_code
            && opportunity.region_code.as_deref() != Some(region.as_str())
        {
            return false;
        }
        true
    }
}

#[async_trait]
impl ProviderAdapter for ScrapePortalAdapter {
    async fn search(&self, filters: &SearchFilters) -> Result<Vec<Opportunity>> {
        let html = self.fetch_results_page().await?;
        let tenders = Self::parse_tenders(&html);
        Ok(tenders
            .into_iter()
            .map(|t| self.to_opportunity(t))
            .filter(|o| Self::matches_filters(o, filters))
            .collect())
    }

    async fn get_details(&self, external_id: &str) -> Result<Option<Opportunity>> {
        // The results listing is the only page this adapter knows how
        // to read; a single tender is found by scanning it again (no
        // per-tender detail endpoint exists upstream).
        let html = self.fetch_results_page().await?;
        Ok(Self::parse_tenders(&html)
            .into_iter()
            .find(|t| t.external_id() == external_id)
            .map(|t| self.to_opportunity(t)))
    }

    async fn get_items(&self, external_id: &str) -> Result<Vec<OpportunityItem>> {
        let html = self.fetch_results_page().await?;
        let tender = Self::parse_tenders(&html)
            .into_iter()
            .find(|t| t.external_id() == external_id)
            .ok_or_else(|| Error::not_found(format!("scrape_portal opportunity {external_id}")))?;

        let Some(arg) = tender.items_onclick_arg else {
            return Ok(Vec::new());
        };
        let url = if arg.starts_with("http") {
            arg
        } else {
            format!("{}{}", self.config.item_fetch_base_url, arg)
        };

        let client = self.client.clone();
        let body = self
            .limiter
            .run(|| async move {
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| Error::upstream_transient("scrape_portal", e.to_string()))?;
                response
                    .text()
                    .await
                    .map_err(|e| Error::upstream_permanent("scrape_portal", e.to_string()))
            })
            .await?;

        Ok(Self::parse_items_page(&body))
    }

    fn provider_name(&self) -> &str {
        "scrape_portal"
    }

    fn metadata(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("results_url".to_owned(), serde_json::Value::String(self.config.results_url.clone()));
        map
    }
}

impl ScrapePortalAdapter {
    /// The items page is a plain HTML table, one `<tr>` per line item.
    fn parse_items_page(html: &str) -> Vec<OpportunityItem> {
        let document = Html::parse_document(html);
        let row_selector = Selector::parse("table tr").unwrap();
        let cell_selector = Selector::parse("td").unwrap();

        document
            .select(&row_selector)
            .enumerate()
            .filter_map(|(i, row)| {
                let cells: Vec<String> = row
                    .select(&cell_selector)
                    .map(|c| c.text().collect::<String>().trim().to_owned())
                    .collect();
                if cells.len() < 2 || cells[1].is_empty() {
                    return None;
                }
                Some(OpportunityItem {
                    item_number: i as i32 + 1,
                    description: cells[1].clone(),
                    quantity: cells.get(2).and_then(|s| s.replace(',', ".").parse().ok()),
                    unit: cells.get(3).cloned(),
                    unit_estimated_value: cells.get(4).and_then(|s| s.replace(',', ".").parse().ok()),
                    material_or_service: MaterialOrService::Material,
                    ncm_code: None,
                    me_epp_exclusive: false,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_html() -> String {
        r#"
        <html><body>
        <form method="post" name="Form1">
        <table class="td"><tr class="tex3"><td class="tex3">
        <b>Ministério da Economia<br>Secretaria de Compras<br>Entidade Exemplo<br>Código da UASG: 123456</b>
        Pregão Eletrônico Nº 00045/2026
        Objeto: Aquisição de notebooks
        Edital a partir de: 01/03/2026
        Entrega da Proposta: 15/03/2026
        Endereço: Rua das Flores, 100 - Brasília (DF)
        <input type="submit" value="Itens e Download" onclick="abreItens('/ConsultaLicitacoes/itens.asp?id=123')">
        </td></tr></table>
        </form>
        </body></html>
        "#
        .to_owned()
    }

    #[test]
    fn parses_entity_uasg_and_pregao() {
        let tenders = ScrapePortalAdapter::parse_tenders(&sample_html());
        assert_eq!(tenders.len(), 1);
        let t = &tenders[0];
        assert_eq!(t.uasg, "123456");
        assert_eq!(t.pregao_numero, "00045");
        assert_eq!(t.pregao_ano, "2026");
        assert_eq!(t.entity_name, "Entidade Exemplo");
    }

    #[test]
    fn parses_dates_and_region() {
        let tenders = ScrapePortalAdapter::parse_tenders(&sample_html());
        let t = &tenders[0];
        assert_eq!(t.publication_date.as_deref(), Some("01/03/2026"));
        assert_eq!(t.closing_date.as_deref(), Some("15/03/2026"));
        assert_eq!(t.uf, "DF");
    }

    #[test]
    fn extracts_items_onclick_argument() {
        let tenders = ScrapePortalAdapter::parse_tenders(&sample_html());
        assert_eq!(
            tenders[0].items_onclick_arg.as_deref(),
            Some("/ConsultaLicitacoes/itens.asp?id=123")
        );
    }

    #[test]
    fn builds_stable_external_id() {
        let tenders = ScrapePortalAdapter::parse_tenders(&sample_html());
        assert_eq!(tenders[0].external_id(), "scrape_portal_123456_00045_2026");
    }

    #[test]
    fn missing_bold_tag_degrades_to_unknown_entity_instead_of_failing() {
        let html = r#"
        <html><body>
        <form method="post" name="Form1">
        <table class="td"><tr class="tex3"><td class="tex3">
        Pregão Eletrônico Nº 00045/2026
        Objeto: Aquisição de notebooks
        </td></tr></table>
        </form>
        </body></html>
        "#;
        let tenders = ScrapePortalAdapter::parse_tenders(html);
        assert_eq!(tenders.len(), 1);
        assert_eq!(tenders[0].entity_name, UNKNOWN_ENTITY);
    }
}
