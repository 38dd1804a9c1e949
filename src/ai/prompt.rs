//! Prompt construction for receipt field extraction.

/// Build the extraction prompt for normalized receipt text.
///
/// The answer format is four labeled lines; `request_location` drops the
/// `Ubicacion` line when the deployment does not want it.
///
/// ```
/// use smart_receipt::ai::build_prompt;
///
/// let prompt = build_prompt("OXXO TOTAL 45.50", true);
/// assert!(prompt.contains("OXXO TOTAL 45.50"));
/// assert!(prompt.contains("Ubicacion:"));
/// assert!(!build_prompt("OXXO", false).contains("Ubicacion:"));
/// ```
pub fn build_prompt(receipt_text: &str, request_location: bool) -> String {
    let mut prompt = String::with_capacity(receipt_text.len() + 600);
    prompt.push_str(
        "Eres un asistente que analiza tickets de compra de México.\n\
         A partir del texto extraído por OCR de un ticket, identifica el comercio, \
         el monto total pagado y la categoría del gasto",
    );
    if request_location {
        prompt.push_str(", además de la ubicación de la tienda");
    }
    prompt.push_str(".\n\nTexto del ticket:\n\"\"\"\n");
    prompt.push_str(receipt_text);
    prompt.push_str("\n\"\"\"\n\nResponde únicamente con estas líneas, sin texto adicional:\n");
    prompt.push_str("Comercio: <nombre del comercio>\n");
    prompt.push_str("Monto: <total pagado con dos decimales, sin símbolo de moneda>\n");
    prompt.push_str("Categoria: <una de Despensa, Gasolina, Juguetes, Comida, Otros>\n");
    if request_location {
        prompt.push_str("Ubicacion: <colonia y municipio>\n");
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_every_category() {
        let prompt = build_prompt("PEMEX MAGNA 650.00", true);
        for category in crate::receipt::Category::ALL {
            assert!(prompt.contains(category.as_str()), "missing {}", category);
        }
    }

    #[test]
    fn test_prompt_line_order() {
        let prompt = build_prompt("TEXT", true);
        let comercio = prompt.find("Comercio:").unwrap();
        let monto = prompt.find("Monto:").unwrap();
        let categoria = prompt.find("Categoria:").unwrap();
        let ubicacion = prompt.find("Ubicacion:").unwrap();
        assert!(comercio < monto && monto < categoria && categoria < ubicacion);
    }
}
