use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use courier_core::domain::context::CustomerContext;
use courier_core::domain::interaction::VerificationResult;
use courier_core::money::format_amounts;

use crate::llm::LlmClient;

/// Confidence recorded when the verifier could not give a verdict.
pub const FAIL_OPEN_CONFIDENCE: u8 = 60;
const DEFAULT_CONFIDENCE: u8 = 70;

const RUBRIC: &str = "Revisas respuestas de un asistente de WhatsApp de una empresa de encomiendas \
entre Barranquilla y Curazao antes de enviarlas al cliente. Evalúa la respuesta propuesta con \
estos criterios:
1. Responde la pregunta del cliente.
2. Es consistente con los datos del cliente que se indican abajo; no agrega números de guía, fechas, montos ni direcciones que no estén allí.
3. Los montos llevan el formato de su moneda ($ 150.000 COP, US$ 25.00, NAf 45.00).
4. El tono es amable y breve, en español.

Contesta únicamente con un objeto JSON con esta forma:
{\"approved\": true|false, \"confidence\": 0-100, \"issues\": [\"...\"], \"improved_text\": \"...\"}
Si no apruebas la respuesta, incluye en improved_text una versión corregida lista para enviar.";

#[derive(Debug, Deserialize)]
struct Verdict {
    approved: bool,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default, alias = "improvedText")]
    improved_text: Option<String>,
}

/// Second, independent model call that approves or corrects a generated
/// reply. Any failure approves the candidate.
pub struct ResponseVerifier {
    client: Arc<dyn LlmClient>,
}

impl ResponseVerifier {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    pub async fn verify(
        &self,
        candidate: &str,
        original_message: &str,
        context: &CustomerContext,
        correlation_id: &str,
    ) -> VerificationResult {
        let system_prompt = format!("{RUBRIC}\n\n{}", facts_summary(context));
        let user_prompt = format!(
            "Mensaje del cliente:\n{original_message}\n\nRespuesta propuesta:\n{candidate}"
        );

        let raw = match self.client.complete(&system_prompt, &user_prompt).await {
            Ok(raw) => raw,
            Err(error) => return fail_open(correlation_id, error.to_string()),
        };

        match parse_verdict(&raw) {
            Ok(result) => {
                info!(
                    event_name = "assistant.verification.completed",
                    correlation_id,
                    approved = result.approved,
                    confidence = result.confidence,
                    issues = result.issues.len(),
                    "verifier returned a verdict"
                );
                result
            }
            Err(reason) => fail_open(correlation_id, reason),
        }
    }
}

fn fail_open(correlation_id: &str, reason: String) -> VerificationResult {
    warn!(
        event_name = "assistant.verification.failed_open",
        correlation_id,
        error = %reason,
        "verifier unavailable, approving the generated reply"
    );
    VerificationResult {
        approved: true,
        confidence: FAIL_OPEN_CONFIDENCE,
        issues: vec![format!("verification unavailable: {reason}")],
        improved_text: None,
    }
}

/// Reads the verdict out of a completion that may wrap the JSON in prose or
/// a code fence.
pub fn parse_verdict(raw: &str) -> Result<VerificationResult, String> {
    let start = raw.find('{').ok_or_else(|| "verdict has no JSON object".to_string())?;
    let end = raw.rfind('}').ok_or_else(|| "verdict has no JSON object".to_string())?;
    if end < start {
        return Err("verdict has no JSON object".to_string());
    }

    let verdict: Verdict = serde_json::from_str(&raw[start..=end])
        .map_err(|error| format!("verdict is not valid JSON: {error}"))?;

    let confidence = verdict
        .confidence
        .filter(|value| value.is_finite())
        .map(|value| value.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(DEFAULT_CONFIDENCE);
    let improved_text = verdict
        .improved_text
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    Ok(VerificationResult {
        approved: verdict.approved,
        confidence,
        issues: verdict.issues,
        improved_text,
    })
}

fn facts_summary(context: &CustomerContext) -> String {
    if !context.found {
        return "Datos del cliente: no se encontró una cuenta para este número; la respuesta no \
debe mencionar paquetes ni saldos concretos."
            .to_string();
    }
    if context.facts_unavailable {
        return "Datos del cliente: cliente identificado, pero sus paquetes no se pudieron consultar."
            .to_string();
    }

    let tracking_numbers = context
        .pending_delivery
        .iter()
        .map(|package| format!("{} ({})", package.tracking_number, package.status.label()))
        .collect::<Vec<_>>();
    let pending = if context.has_pending_balance() {
        format_amounts(&context.pending_by_currency)
    } else {
        "sin saldo pendiente".to_string()
    };
    format!(
        "Datos del cliente: {}; paquetes pendientes de entrega: {}; saldo: {pending}.",
        context.first_name.as_deref().unwrap_or("sin nombre"),
        if tracking_numbers.is_empty() { "ninguno".to_string() } else { tracking_numbers.join(", ") }
    )
}
