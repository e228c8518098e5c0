//! HTML rendering for the list views and the login page.

use crate::models::Choice;
use crate::pagination::Page;
use serde::Serialize;

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// JSON that can sit inside a `<script>` element.
pub fn json_island<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

pub fn layout(title: &str, username: Option<&str>, body: &str) -> String {
    let nav = match username {
        Some(name) => format!(
            r#"<nav>
        <a href="/states/">Estados</a>
        <a href="/municipalities/">Municípios</a>
        <a href="/districts/">Distritos</a>
        <a href="/companies/">Empresas</a>
        <span class="user">{} · <a href="/logout/">Sair</a></span>
    </nav>"#,
            escape(name)
        ),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} · Arko</title>
    <style>
        body {{ font-family: system-ui, sans-serif; margin: 0 auto; max-width: 1100px; padding: 1rem; }}
        nav a, nav .user {{ margin-right: 1rem; }}
        nav .user {{ float: right; }}
        table {{ border-collapse: collapse; width: 100%; margin: 1rem 0; }}
        th, td {{ border-bottom: 1px solid #ddd; padding: .4rem .6rem; text-align: left; }}
        form.filters label {{ margin-right: .5rem; }}
        .errors {{ color: #b00020; }}
        .pagination a, .pagination span {{ margin-right: .6rem; }}
    </style>
</head>
<body>
    {nav}
    <h1>{title}</h1>
    {body}
</body>
</html>
"#,
        title = escape(title),
        nav = nav,
        body = body,
    )
}

pub fn login_page(next: &str, error: Option<&str>) -> String {
    let error = error
        .map(|e| format!(r#"<p class="errors">{}</p>"#, escape(e)))
        .unwrap_or_default();
    let body = format!(
        r#"{error}
    <form method="post" action="/accounts/login/">
        <p><label>Usuário <input type="text" name="username" autofocus required></label></p>
        <p><label>Senha <input type="password" name="password" required></label></p>
        <input type="hidden" name="next" value="{next}">
        <button type="submit">Entrar</button>
    </form>"#,
        error = error,
        next = escape(next),
    );
    layout("Login", None, &body)
}

/// One input of a filter form.
pub enum FormField<'a> {
    Text {
        name: &'a str,
        label: &'a str,
        value: Option<&'a str>,
    },
    Select {
        name: &'a str,
        label: &'a str,
        choices: &'a [Choice],
        selected: Option<&'a str>,
    },
}

pub fn filter_form(fields: &[FormField<'_>], errors: &[(String, String)]) -> String {
    let mut html = String::from(r#"<form method="get" class="filters">"#);

    for field in fields {
        match field {
            FormField::Text { name, label, value } => {
                html.push_str(&format!(
                    r#"<label>{label} <input type="text" name="{name}" value="{value}"></label>"#,
                    label = escape(label),
                    name = escape(name),
                    value = escape(value.unwrap_or("")),
                ));
            }
            FormField::Select {
                name,
                label,
                choices,
                selected,
            } => {
                let mut options = String::from(r#"<option value="">---------</option>"#);
                for choice in choices.iter() {
                    let id = choice.id.to_string();
                    let is_selected = selected.map(str::trim) == Some(id.as_str());
                    options.push_str(&format!(
                        r#"<option value="{id}"{sel}>{label}</option>"#,
                        id = id,
                        sel = if is_selected { " selected" } else { "" },
                        label = escape(&choice.label),
                    ));
                }
                html.push_str(&format!(
                    r#"<label>{label} <select name="{name}">{options}</select></label>"#,
                    label = escape(label),
                    name = escape(name),
                    options = options,
                ));
            }
        }
    }
    html.push_str(r#"<button type="submit">Filtrar</button></form>"#);

    if !errors.is_empty() {
        html.push_str(r#"<ul class="errors">"#);
        for (field, message) in errors {
            html.push_str(&format!(
                "<li>{}: {}</li>",
                escape(field),
                escape(message)
            ));
        }
        html.push_str("</ul>");
    }
    html
}

/// Table with escaped header and cell text.
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut html = String::from("<table><thead><tr>");
    for header in headers {
        html.push_str(&format!("<th>{}</th>", escape(header)));
    }
    html.push_str("</tr></thead><tbody>");
    if rows.is_empty() {
        html.push_str(&format!(
            r#"<tr><td colspan="{}">Nenhum registro encontrado.</td></tr>"#,
            headers.len()
        ));
    }
    for row in rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<td>{}</td>", escape(cell)));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

/// `?<query>` with `page` set to `page`, keeping the active filters.
pub fn page_href(query: Option<&str>, page: i64) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
        if key != "page" {
            serializer.append_pair(&key, &value);
        }
    }
    serializer.append_pair("page", &page.to_string());
    format!("?{}", serializer.finish())
}

pub fn pagination(page: &Page, query: Option<&str>) -> String {
    let mut html = String::from(r#"<div class="pagination">"#);
    if let Some(previous) = page.previous_number() {
        html.push_str(&format!(
            r#"<a href="{}">&laquo; primeira</a><a href="{}">anterior</a>"#,
            escape(&page_href(query, 1)),
            escape(&page_href(query, previous)),
        ));
    }
    html.push_str(&format!(
        "<span>Página {} de {} ({}–{} de {})</span>",
        page.number,
        page.num_pages,
        page.start_index(),
        page.end_index(),
        page.count
    ));
    if let Some(next) = page.next_number() {
        html.push_str(&format!(
            r#"<a href="{}">próxima</a><a href="{}">última &raquo;</a>"#,
            escape(&page_href(query, next)),
            escape(&page_href(query, page.num_pages)),
        ));
    }
    html.push_str("</div>");
    html
}

pub fn data_script(json: &str) -> String {
    format!(
        r#"<script id="data-json" type="application/json">{}</script>"#,
        json
    )
}
