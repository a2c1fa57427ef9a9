use crate::pricing::{CourseMaterials, MaterialRow};

use super::escape_html;

/// The three course-material tables printed on the second page: the campus's
/// own table, the general courses and the military courses.
pub fn material_tables_html(materials: &CourseMaterials, campus: &str) -> String {
    let (title, rows) = materials.table_for(campus);
    let mut html = String::new();
    push_table(&mut html, &title, &rows);
    push_table(&mut html, "Material Didático (geral)", &materials.general);
    push_table(&mut html, "Material Militares", &materials.military);
    html
}

/// One `<span class='unidade-item'>` per campus for the letter footer.
pub fn campus_list_html<'a>(campuses: impl IntoIterator<Item = &'a str>) -> String {
    campuses
        .into_iter()
        .map(|name| format!("<span class='unidade-item'>{}</span>", escape_html(name)))
        .collect()
}

fn push_table(html: &mut String, title: &str, rows: &[MaterialRow]) {
    html.push_str("<table class=\"pag2\"><tr><th colspan=\"3\">");
    html.push_str(&escape_html(title));
    html.push_str("</th></tr>");
    for row in rows {
        html.push_str("<tr><td>");
        html.push_str(&escape_html(&row.course));
        html.push_str("</td><td>");
        html.push_str(&escape_html(&row.total));
        html.push_str("</td><td>");
        html.push_str(&escape_html(&row.installments));
        html.push_str("</td></tr>");
    }
    html.push_str("</table><br>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::PricingCatalog;

    #[test]
    fn sao_joao_gets_its_own_table() {
        let catalog = PricingCatalog::builtin();
        let html = material_tables_html(&catalog.course_materials, "SÃO JOÃO DE MERITI");
        assert!(html.starts_with(
            "<table class=\"pag2\"><tr><th colspan=\"3\">Material Didático (exclusivo São João de Meriti)</th></tr>"
        ));
        assert!(html.contains("R$ 1.933,56"));
        assert!(!html.contains("R$ 2.552,80"));
        assert_eq!(html.matches("<table").count(), 3);
    }

    #[test]
    fn standard_table_for_other_campuses() {
        let catalog = PricingCatalog::builtin();
        let html = material_tables_html(&catalog.course_materials, "BANGU");
        assert!(html.contains("<tr><td>1ª ao 5ª ano</td><td>R$ 2.552,80</td><td>11x de R$ 232,07</td></tr>"));
        assert!(html.contains("Material Militares"));
        assert!(html.ends_with("</table><br>"));
    }

    #[test]
    fn campus_spans() {
        assert_eq!(
            campus_list_html(["BANGU", "TAQUARA"]),
            "<span class='unidade-item'>BANGU</span><span class='unidade-item'>TAQUARA</span>"
        );
    }
}
