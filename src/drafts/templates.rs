//! Deterministic narrative templates.
//!
//! Each section maps its exercise fields into sentences that follow the
//! block's recommended structure. A clause is included only when the fields
//! it needs are present (non-empty); missing fields never raise an error.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{NoExpand, Regex};

use crate::types::{ExerciseData, ProtagonistData};
use crate::util::strip_trailing_period;

fn run_of_periods_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.{2,}").unwrap())
}

fn spaced_periods_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.\s*\.").unwrap())
}

fn run_of_spaces_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s{2,}").unwrap())
}

fn self_reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)nosotros|nuestra empresa|nuestro producto").unwrap())
}

/// Collapse repeated periods and whitespace, then trim.
pub fn clean_draft(text: &str) -> String {
    let text = run_of_periods_re().replace_all(text, ".");
    let text = spaced_periods_re().replace_all(&text, ".");
    let text = run_of_spaces_re().replace_all(&text, " ");
    text.trim().to_string()
}

/// Read-only view over one exercise's fields; empty values count as absent.
#[derive(Clone, Copy)]
struct Fields<'a>(Option<&'a ExerciseData>);

impl<'a> Fields<'a> {
    fn of(exercises: &'a BTreeMap<String, ExerciseData>, id: &str) -> Self {
        Fields(exercises.get(id))
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.0
            .and_then(|f| f.get(key))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// `text` with one trailing period removed, re-terminated.
fn sentence(text: &str) -> String {
    format!("{}.", strip_trailing_period(text))
}

fn present(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.is_empty())
}

/// Build a pre-filled draft for `section` from its exercises.
///
/// Sections 2 and 9 reconnect with the protagonist cast in section 1.
/// Unknown sections yield an empty string.
pub fn generate_block_draft(
    section: u8,
    exercises: &BTreeMap<String, ExerciseData>,
    protagonist: &ProtagonistData,
) -> String {
    match section {
        1 => problem(exercises),
        2 => solution(exercises, protagonist),
        3 => superpower(exercises),
        4 => traction(exercises),
        5 => market(exercises),
        6 => model(exercises),
        7 => ask(exercises),
        8 => team(exercises),
        9 => close(exercises, protagonist),
        _ => String::new(),
    }
}

// =============================================================================
// Sections
// =============================================================================

fn problem(ex: &BTreeMap<String, ExerciseData>) -> String {
    let digger = Fields::of(ex, "1_3");
    let person = Fields::of(ex, "1_4");
    let scale = Fields::of(ex, "1_5");
    let mut parts = Vec::new();

    if let Some(name) = person.get("nombre") {
        let mut line = name.to_string();
        if let Some(age) = person.get("edad") {
            line.push_str(&format!(" tiene {} años", age));
        }
        if let Some(city) = person.get("ciudad") {
            line.push_str(&format!(" y vive en {}", city));
        }
        line.push('.');
        if let Some(profession) = person.get("profesion") {
            line.push_str(&format!(" {}.", profession));
        }
        parts.push(line);
    }

    if let Some(aspiration) = person.get("aspiracion") {
        parts.push(format!("{}.", aspiration));
    }

    // Deepest "why" level wins over the stated frustration
    let root = digger
        .get("nivel_5")
        .or_else(|| digger.get("nivel_4"))
        .or_else(|| digger.get("nivel_3"))
        .or_else(|| person.get("frustracion"));
    if let Some(root) = root {
        parts.push(format!(
            "El problema es que {}.",
            strip_trailing_period(&root.to_lowercase())
        ));
    }

    if let Some(context) = person.get("contexto") {
        parts.push(format!("{}.", context));
    }

    if let Some(amount) = scale.get("cantidad") {
        let line = match scale.get("tangible") {
            Some(tangible) => tangible.to_string(),
            None => {
                let mut line = format!("Hay {} personas que enfrentan este problema", amount);
                if let Some(frequency) = scale.get("frecuencia") {
                    line.push_str(&format!(" {}", frequency));
                }
                line
            }
        };
        parts.push(sentence(&line));
    }

    clean_draft(&parts.join(" "))
}

fn solution(ex: &BTreeMap<String, ExerciseData>, protagonist: &ProtagonistData) -> String {
    let story = Fields::of(ex, "2_1");
    let steps = Fields::of(ex, "2_2");
    let mut parts = Vec::new();

    if let Some(generated) = story.get("historia_generada") {
        parts.push(generated.to_string());
    } else {
        if let Some(name) = present(&protagonist.name) {
            parts.push(format!("{} entra a nuestra plataforma.", name));
        }
        if let Some(reveal) = steps.get("reveal") {
            parts.push(sentence(reveal));
        }
        if let Some(change) = steps.get("transformacion") {
            parts.push(sentence(change));
        }
    }

    if let Some(vision) = steps.get("vision") {
        parts.push(format!("El resultado: {}.", strip_trailing_period(vision)));
    }

    clean_draft(&parts.join(" "))
}

fn superpower(ex: &BTreeMap<String, ExerciseData>) -> String {
    let detector = Fields::of(ex, "3_1");
    let stage = Fields::of(ex, "3_2");
    let mut parts = Vec::new();

    if let Some(competitor) = detector.get("competidor_nombre") {
        let what = detector
            .get("competidor_que_hace")
            .unwrap_or("opera en este espacio");
        parts.push(format!("{} {}.", competitor, what));
    }

    if let Some(diff) = detector.get("diferenciacion") {
        parts.push(format!(
            "Nosotros nos diferenciamos porque {}.",
            strip_trailing_period(&diff.to_lowercase())
        ));
    }

    if let Some(narrative) = detector.get("narrativa_generada") {
        parts.push(narrative.to_string());
    }

    if let Some(validation) = stage.get("validacion_etapa") {
        parts.push(sentence(validation));
    }

    clean_draft(&parts.join(" "))
}

fn traction(ex: &BTreeMap<String, ExerciseData>) -> String {
    let metric = Fields::of(ex, "4_1");
    let timeline = Fields::of(ex, "4_2");
    let momentum = Fields::of(ex, "4_3");
    let mut parts = Vec::new();

    if let Some(today) = metric.get("numero_hoy") {
        let label = match metric.get("tipo_metrica") {
            Some("otra") => metric.get("otra_metrica").unwrap_or("unidades"),
            Some(kind) => kind,
            None => "usuarios",
        };
        parts.push(format!("Hoy tenemos {} {}.", today, label));
        if let (Some(before), Some(growth)) =
            (metric.get("numero_6_meses"), metric.get("crecimiento"))
        {
            parts.push(format!("Hace 6 meses eran {}. Crecimos {}.", before, growth));
        }
    }

    if let (Some(date), Some(value)) = (timeline.get("hito_1_fecha"), timeline.get("hito_1_metrica")) {
        parts.push(format!("En {}: {}.", date, value));
        if let Some(context) = timeline.get("hito_1_contexto") {
            parts.push(sentence(context));
        }
    }
    if let (Some(date), Some(value)) = (timeline.get("hito_3_fecha"), timeline.get("hito_3_metrica")) {
        parts.push(format!("En {}: {}.", date, value));
    }

    for key in ["logro_reciente", "senal_crecimiento"] {
        if let Some(text) = momentum.get(key) {
            parts.push(sentence(text));
        }
    }

    clean_draft(&parts.join(" "))
}

fn market(ex: &BTreeMap<String, ExerciseData>) -> String {
    let units = Fields::of(ex, "5_1");
    let rivals = Fields::of(ex, "5_2");
    let circles = Fields::of(ex, "5_3");
    let mut parts = Vec::new();

    if let (Some(amount), Some(unit)) = (units.get("cantidad_inicial"), units.get("unidad")) {
        parts.push(format!("Hay {} {}.", amount, unit));
    }
    if let Some(expanded) = units.get("cantidad_expandido") {
        parts.push(format!("En el mercado expandido son {}.", expanded));
    }
    if let Some(price) = units.get("valor_promedio") {
        parts.push(format!(
            "A un precio promedio de {}, la oportunidad es significativa.",
            price
        ));
    }

    if let Some(rival) = rivals.get("lannister_nombre") {
        parts.push(format!("Nuestro competidor más cercano es {}.", rival));
        if let Some(weakness) = rivals.get("lannister_debilidad") {
            parts.push(format!("Su debilidad: {}.", strip_trailing_period(weakness)));
        }
    }

    if let Some(first) = circles.get("circulo_1") {
        parts.push(sentence(first));
    }
    if let Some(second) = circles.get("circulo_2") {
        parts.push(format!("Próxima expansión: {}.", strip_trailing_period(second)));
    }

    clean_draft(&parts.join(" "))
}

fn model(ex: &BTreeMap<String, ExerciseData>) -> String {
    let mechanism = Fields::of(ex, "6_1");
    let economics = Fields::of(ex, "6_2");
    let scale = Fields::of(ex, "6_3");
    let mut parts = Vec::new();

    if let (Some(customer), Some(price)) = (mechanism.get("cliente"), mechanism.get("precio")) {
        let frequency = mechanism
            .get("frecuencia")
            .map(|f| format!(" {}", f))
            .unwrap_or_default();
        parts.push(format!("{} paga {}{}.", customer, price, frequency));
    }
    if let Some(sources) = mechanism.get("fuentes_multiples") {
        parts.push(sentence(sources));
    }

    if let (Some(cac), Some(ltv)) = (economics.get("cac"), economics.get("ltv")) {
        parts.push(format!(
            "El costo de adquisición es {}. El valor de vida del cliente es {}.",
            cac, ltv
        ));
        if let Some(ratio) = economics.get("ratio") {
            parts.push(format!("La relación LTV/CAC es de {}.", ratio));
        }
    }

    if let Some(leverage) = scale.get("escala_sin_costo") {
        parts.push(sentence(leverage));
    }

    clean_draft(&parts.join(" "))
}

fn ask(ex: &BTreeMap<String, ExerciseData>) -> String {
    let ask = Fields::of(ex, "7_1");
    let uses = Fields::of(ex, "7_2");
    let results = Fields::of(ex, "7_3");
    let mut parts = Vec::new();

    if let Some(amount) = ask.get("monto") {
        parts.push(format!("Buscamos {}.", amount));
    }

    for i in 1..=3 {
        let name = uses.get(&format!("cat_{}_nombre", i));
        let share = uses.get(&format!("cat_{}_porcentaje", i));
        if let (Some(name), Some(share)) = (name, share) {
            parts.push(format!("El {} va a {}.", share, name.to_lowercase()));
            if let Some(detail) = uses.get(&format!("cat_{}_detalle", i)) {
                parts.push(sentence(detail));
            }
        }
    }

    let metrics: Vec<&str> = ["metrica_1", "metrica_2", "metrica_3"]
        .iter()
        .filter_map(|k| results.get(k))
        .collect();
    if !metrics.is_empty() {
        parts.push(format!("Con esto, proyectamos alcanzar {}.", metrics.join(", ")));
    }

    clean_draft(&parts.join(" "))
}

fn team(ex: &BTreeMap<String, ExerciseData>) -> String {
    let founders = Fields::of(ex, "8_1");
    let complement = Fields::of(ex, "8_2");
    let mut parts = Vec::new();

    for i in 1..=3 {
        let Some(name) = founders.get(&format!("fundador_{}_nombre", i)) else {
            continue;
        };
        let mut line = name.to_string();
        if let Some(role) = founders.get(&format!("fundador_{}_rol", i)) {
            line.push_str(&format!(", {}", role));
        }
        line.push('.');
        if let Some(experience) = founders.get(&format!("fundador_{}_experiencia", i)) {
            line.push_str(&format!(" {}", sentence(experience)));
        }
        parts.push(line);
    }

    if let Some(story) = complement.get("historia_equipo") {
        parts.push(sentence(story));
    }
    if let Some(gap) = complement.get("falta") {
        parts.push(format!("Necesitamos: {}.", strip_trailing_period(gap)));
    }

    // Paragraph breaks collapse to single spaces in the cleaned draft
    clean_draft(&parts.join("\n\n"))
}

fn close(ex: &BTreeMap<String, ExerciseData>, protagonist: &ProtagonistData) -> String {
    let close = Fields::of(ex, "9_1");
    let mut parts = Vec::new();

    if let Some(name) = present(&protagonist.name) {
        parts.push(format!("{} hoy", name));
        match close.get("cambio_protagonista") {
            Some(change) => parts.push(sentence(change)),
            None => parts.push("tiene una vida diferente.".to_string()),
        }
    }

    for key in ["vision_mundo", "llamado_accion", "siguiente_paso"] {
        if let Some(text) = close.get(key) {
            parts.push(sentence(text));
        }
    }

    clean_draft(&parts.join(" "))
}

// =============================================================================
// Exercise-level templates
// =============================================================================

/// Display label for a weekday field id ("miercoles" -> "Miércoles").
pub fn weekday_label(value: &str) -> &str {
    match value {
        "lunes" => "Lunes",
        "martes" => "Martes",
        "miercoles" => "Miércoles",
        "jueves" => "Jueves",
        "viernes" => "Viernes",
        "sabado" => "Sábado",
        "domingo" => "Domingo",
        other => other,
    }
}

/// The customer story of exercise 2.1: client, disaster, transformation.
pub fn customer_story(fields: &ExerciseData) -> String {
    let f = Fields(Some(fields));
    let mut parts = Vec::new();

    if let Some(client) = f.get("cliente_nombre") {
        parts.push(client.to_string());
        if let Some(context) = f.get("cliente_contexto") {
            parts.push(format!("de {}", context));
        }
        if let Some(problem) = f.get("cliente_problema") {
            parts.push(format!("enfrentaba un problema grave: {}.", problem));
        }
    }

    if let (Some(day), Some(hour)) = (f.get("dia_desastre"), f.get("hora_desastre")) {
        parts.push(format!("Un {} a las {},", weekday_label(day), hour));
    }
    if let Some(what) = f.get("que_paso") {
        parts.push(format!("{}.", what));
    }
    if let Some(cost) = f.get("costo_incidente") {
        parts.push(format!("Ese incidente le costó ${}.", cost));
    }

    if let Some(change) = f.get("que_cambio") {
        parts.push(format!("Hoy, con nuestra solución, {}.", change));
    }
    if let Some(hours) = f.get("tiempo_ahorrado") {
        parts.push(format!("Ahorra {} horas.", hours));
    }
    if let Some(money) = f.get("dinero_ahorrado") {
        parts.push(format!("Y ha recuperado ${}.", money));
    }

    parts.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Swap self-references in the stated differentiation for the competitor's name.
///
/// If the sentence still reads true, the differentiation is generic.
pub fn competitor_test(fields: &ExerciseData) -> String {
    let f = Fields(Some(fields));
    let diff = f.get("diferenciacion").unwrap_or("");
    let competitor = f.get("competidor_nombre").unwrap_or("[COMPETIDOR]");
    self_reference_re()
        .replace_all(diff, NoExpand(competitor))
        .into_owned()
}
