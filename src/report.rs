//! PDF export of a completed consultation.
//!
//! Rendering happens in two phases. `build_layout` turns the applicant
//! summary and the stored bureau payloads into a flat list of layout ops,
//! and `paginate` assigns them page positions against a fixed Letter page.
//! Both phases are pure and deterministic, so pagination and the
//! missing-data placeholders are unit-testable without producing a single
//! PDF byte. The `printpdf` backend then draws the placed ops.
//!
//! Payloads are opaque JSON; any absent payload or sub-field degrades to a
//! placeholder line. Rendering never fails on missing optional data.

use crate::errors::AppError;
use crate::models::ApplicantSummary;
use chrono::{DateTime, Utc};
use printpdf::{BuiltinFont, Color, Mm, PdfDocument, Rgb};
use serde_json::Value;

const PAGE_WIDTH_MM: f32 = 215.9;
const PAGE_HEIGHT_MM: f32 = 279.4;
const MARGIN_MM: f32 = 18.0;
/// Content must stop above the footer band.
const BOTTOM_LIMIT_MM: f32 = 24.0;

const PLACEHOLDER: &str = "Sin información disponible";

/// One drawable line of the report.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutOp {
    /// Document title, first page only.
    Title(String),
    /// Grey subtitle line under the title.
    Subtitle(String),
    /// Section heading with rule.
    Section(String),
    /// Regular body line.
    Text(String),
    /// Indented detail line.
    Detail(String),
    /// Vertical gap.
    Spacer,
}

impl LayoutOp {
    fn height_mm(&self) -> f32 {
        match self {
            LayoutOp::Title(_) => 10.0,
            LayoutOp::Subtitle(_) => 5.5,
            LayoutOp::Section(_) => 11.0,
            LayoutOp::Text(_) => 5.0,
            LayoutOp::Detail(_) => 4.5,
            LayoutOp::Spacer => 2.5,
        }
    }
}

/// A layout op with its resolved page position.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOp {
    pub y_mm: f32,
    pub op: LayoutOp,
}

fn text_field(obj: &Value, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "N/D".to_string(),
    }
}

fn respuesta<'a>(payload: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    payload
        .and_then(|p| p.get("respuesta"))
        .and_then(|r| r.get(key))
}

/// Build the full op list for one report.
///
/// Deterministic: identical inputs produce an identical op list.
pub fn build_layout(
    summary: &ApplicantSummary,
    prospector: Option<&Value>,
    income: Option<&Value>,
    report: Option<&Value>,
    generated_at: DateTime<Utc>,
) -> Vec<LayoutOp> {
    let mut ops = Vec::new();

    ops.push(LayoutOp::Title("INFORME DE BURÓ DE CRÉDITO".to_string()));
    ops.push(LayoutOp::Subtitle("Reporte Confidencial".to_string()));
    ops.push(LayoutOp::Subtitle(format!(
        "Generado: {}",
        generated_at.format("%d/%m/%Y %H:%M UTC")
    )));
    ops.push(LayoutOp::Spacer);

    ops.push(LayoutOp::Section("DATOS PERSONALES".to_string()));
    ops.push(LayoutOp::Text(format!(
        "Nombre: {} {}",
        summary.first_name, summary.last_name
    )));
    ops.push(LayoutOp::Text(format!("RFC: {}", summary.rfc)));
    ops.push(LayoutOp::Text(format!(
        "Fecha de Nacimiento: {}",
        summary.birth_date.format("%Y-%m-%d")
    )));
    ops.push(LayoutOp::Text(format!(
        "Domicilio: {}, {}, {} {}",
        summary.address, summary.city, summary.state, summary.postal_code
    )));

    ops.push(LayoutOp::Section("PUNTUACIÓN DE CRÉDITO".to_string()));
    match respuesta(report, "puntuacionCredito") {
        Some(score) => {
            ops.push(LayoutOp::Text(format!("Score: {}", text_field(score, "score"))));
            ops.push(LayoutOp::Text(format!(
                "Categoría: {}",
                text_field(score, "categoria")
            )));
            ops.push(LayoutOp::Text(format!("Fecha: {}", text_field(score, "fecha"))));
        }
        None => ops.push(LayoutOp::Text(PLACEHOLDER.to_string())),
    }

    ops.push(LayoutOp::Section("ESTIMACIÓN DE INGRESOS".to_string()));
    match respuesta(income, "estimacionIngresos") {
        Some(estimate) => {
            ops.push(LayoutOp::Text(format!(
                "Ingreso Estimado: ${}",
                text_field(estimate, "ingresoEstimado")
            )));
            ops.push(LayoutOp::Text(format!(
                "Periodicidad: {}",
                text_field(estimate, "periodicidad")
            )));
            ops.push(LayoutOp::Text(format!(
                "Confiabilidad: {}",
                text_field(estimate, "confiabilidad")
            )));
        }
        None => ops.push(LayoutOp::Text(PLACEHOLDER.to_string())),
    }

    ops.push(LayoutOp::Section("CUENTAS DE CRÉDITO".to_string()));
    match respuesta(prospector, "cuentas").and_then(|c| c.as_array()) {
        Some(cuentas) if !cuentas.is_empty() => {
            for (idx, cuenta) in cuentas.iter().enumerate() {
                ops.push(LayoutOp::Text(format!(
                    "{}. {}",
                    idx + 1,
                    text_field(cuenta, "nombreOtorgante")
                )));
                ops.push(LayoutOp::Detail(format!(
                    "Tipo: {}",
                    text_field(cuenta, "tipoCuenta")
                )));
                ops.push(LayoutOp::Detail(format!(
                    "Saldo Actual: ${}",
                    text_field(cuenta, "saldoActual")
                )));
                ops.push(LayoutOp::Detail(format!(
                    "Saldo Vencido: ${}",
                    text_field(cuenta, "saldoVencido")
                )));
                ops.push(LayoutOp::Detail(format!(
                    "Límite de Crédito: ${}",
                    text_field(cuenta, "limiteCredito")
                )));
                ops.push(LayoutOp::Detail(format!(
                    "Pagos Vencidos: {}",
                    text_field(cuenta, "numeroPagosVencidos")
                )));
                ops.push(LayoutOp::Spacer);
            }
        }
        _ => ops.push(LayoutOp::Text(PLACEHOLDER.to_string())),
    }

    ops.push(LayoutOp::Section("CONSULTAS EFECTUADAS".to_string()));
    match respuesta(prospector, "consultasEfectuadas").and_then(|c| c.as_array()) {
        Some(consultas) if !consultas.is_empty() => {
            for (idx, consulta) in consultas.iter().enumerate() {
                ops.push(LayoutOp::Text(format!(
                    "{}. {}",
                    idx + 1,
                    text_field(consulta, "nombreOtorgante")
                )));
                ops.push(LayoutOp::Detail(format!(
                    "Fecha: {}",
                    text_field(consulta, "fechaConsulta")
                )));
                ops.push(LayoutOp::Detail(format!(
                    "Tipo de Contrato: {}",
                    text_field(consulta, "tipoContrato")
                )));
                ops.push(LayoutOp::Detail(format!(
                    "Importe: ${}",
                    text_field(consulta, "importeContrato")
                )));
                ops.push(LayoutOp::Spacer);
            }
        }
        _ => ops.push(LayoutOp::Text(PLACEHOLDER.to_string())),
    }

    ops
}

/// Assign page positions to the ops against the fixed Letter page.
///
/// An op that would cross the footer band starts a new page.
pub fn paginate(ops: &[LayoutOp]) -> Vec<Vec<PlacedOp>> {
    let mut pages: Vec<Vec<PlacedOp>> = vec![Vec::new()];
    let mut y = PAGE_HEIGHT_MM - MARGIN_MM;

    for op in ops {
        let height = op.height_mm();
        if y - height < BOTTOM_LIMIT_MM {
            pages.push(Vec::new());
            y = PAGE_HEIGHT_MM - MARGIN_MM;
        }
        y -= height;
        pages
            .last_mut()
            .expect("at least one page")
            .push(PlacedOp { y_mm: y, op: op.clone() });
    }

    pages
}

/// Render a consultation report to PDF bytes.
///
/// Pure in the layout sense: all variable content (including the generation
/// timestamp) arrives as parameters.
pub fn render_pdf(
    summary: &ApplicantSummary,
    prospector: Option<&Value>,
    income: Option<&Value>,
    report: Option<&Value>,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, AppError> {
    let ops = build_layout(summary, prospector, income, report, generated_at);
    let pages = paginate(&ops);

    let (doc, first_page, first_layer) = PdfDocument::new(
        "Informe de Buró de Crédito",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );

    let pdf_err = |e: printpdf::Error| AppError::InternalError(format!("PDF error: {}", e));
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_err)?;

    let heading_color = Color::Rgb(Rgb::new(0.12, 0.23, 0.54, None));
    let body_color = Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None));
    let muted_color = Color::Rgb(Rgb::new(0.42, 0.45, 0.50, None));

    for (page_idx, placed) in pages.iter().enumerate() {
        let layer = if page_idx == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            doc.get_page(page).get_layer(layer)
        };

        for placed_op in placed {
            let y = Mm(placed_op.y_mm);
            match &placed_op.op {
                LayoutOp::Title(text) => {
                    layer.set_fill_color(heading_color.clone());
                    layer.use_text(text.clone(), 20.0, Mm(MARGIN_MM), y, &bold);
                }
                LayoutOp::Subtitle(text) => {
                    layer.set_fill_color(muted_color.clone());
                    layer.use_text(text.clone(), 10.0, Mm(MARGIN_MM), y, &regular);
                }
                LayoutOp::Section(text) => {
                    layer.set_fill_color(heading_color.clone());
                    layer.use_text(text.clone(), 13.0, Mm(MARGIN_MM), y, &bold);
                }
                LayoutOp::Text(text) => {
                    layer.set_fill_color(body_color.clone());
                    layer.use_text(text.clone(), 11.0, Mm(MARGIN_MM), y, &regular);
                }
                LayoutOp::Detail(text) => {
                    layer.set_fill_color(body_color.clone());
                    layer.use_text(text.clone(), 9.5, Mm(MARGIN_MM + 6.0), y, &regular);
                }
                LayoutOp::Spacer => {}
            }
        }

        // Fixed footer on every page
        layer.set_fill_color(muted_color.clone());
        layer.use_text(
            "Este documento contiene información confidencial. Protégelo adecuadamente.",
            8.0,
            Mm(MARGIN_MM),
            Mm(12.0),
            &regular,
        );
        layer.use_text(
            format!("Página {} de {}", page_idx + 1, pages.len()),
            8.0,
            Mm(PAGE_WIDTH_MM - MARGIN_MM - 25.0),
            Mm(12.0),
            &regular,
        );
    }

    doc.save_to_bytes().map_err(pdf_err)
}
