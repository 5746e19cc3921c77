use tera::Tera;

const PAGES: [(&str, &str); 3] = [
    ("base.html", include_str!("../templates/base.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("log.html", include_str!("../templates/log.html")),
];

/// Operator pages, compiled into the binary.
pub fn load() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates(PAGES)?;
    Ok(tera)
}
