//! Prompt construction for the remote draft generator.

use crate::blocks::BlockConstraints;

use super::DraftRequest;

/// System prompt: the block's hard limits, structure and reference example.
pub fn system_prompt(block: &BlockConstraints) -> String {
    let structure = block
        .structure
        .iter()
        .map(|s| format!("   - {}: {}", s.title, s.description))
        .collect::<Vec<_>>()
        .join("\n");
    let restrictions = serde_json::to_string(&block.restrictions).unwrap_or_default();
    let prohibited = serde_json::to_string(&block.prohibited).unwrap_or_default();

    format!(
        r#"Eres un coach de pitch de inversión experto. Tu trabajo es redactar el borrador de UN bloque del pitch basándote en los datos que el usuario preparó en ejercicios previos.

REGLAS ABSOLUTAS:
1. El texto DEBE tener entre {min} y {max} palabras. NI UNA MENOS, NI UNA MÁS. Cuenta las palabras antes de responder.
2. DEBE cumplir TODAS estas restricciones: {restrictions}
3. PROHIBIDO usar cualquiera de estos elementos: {prohibited}
4. Sigue esta estructura:
{structure}

5. Usa español latinoamericano natural, directo, sin florituras.
6. NO inventes datos. Solo usa la información proporcionada por el usuario.
7. NO agregues encabezados, títulos ni etiquetas de sección. Solo el texto narrativo corrido.
8. Responde ÚNICAMENTE con el texto del bloque. Sin explicaciones, sin comentarios, sin meta-texto.

EJEMPLO DE REFERENCIA (para que entiendas el tono y estilo, NO lo copies):
{example}"#,
        min = block.min_words,
        max = block.max_words,
        restrictions = restrictions,
        prohibited = prohibited,
        structure = structure,
        example = block.example,
    )
}

/// `  - key: value` lines for the non-blank fields.
fn filled_lines<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    fields
        .into_iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| format!("  - {}: {}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summary of every exercise with at least one filled field.
pub fn exercises_summary(request: &DraftRequest) -> String {
    request
        .exercises
        .iter()
        .filter_map(|(id, fields)| {
            let lines = filled_lines(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            (!lines.is_empty()).then(|| format!("Ejercicio {}:\n{}", id, lines))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn protagonist_summary(request: &DraftRequest) -> String {
    let lines = filled_lines(request.protagonist.as_fields());
    if lines.is_empty() {
        String::new()
    } else {
        format!("\nProtagonista:\n{}", lines)
    }
}

/// User prompt: the prepared exercise data plus the protagonist.
pub fn user_prompt(request: &DraftRequest) -> String {
    let block = &request.constraints;
    format!(
        "Redacta el bloque \"{name}\" ({min}-{max} palabras) usando estos datos:\n\n\
         {exercises}\n{protagonist}\n\n\
         Recuerda: entre {min} y {max} palabras exactas. Solo texto narrativo.",
        name = block.name,
        min = block.min_words,
        max = block.max_words,
        exercises = exercises_summary(request),
        protagonist = protagonist_summary(request),
    )
}
