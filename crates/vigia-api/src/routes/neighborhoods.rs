use axum::Json;

/// The neighborhoods offered on the entry screen. "Outro" lets residents
/// type their own.
pub const NEIGHBORHOODS: [&str; 20] = [
    "Centro",
    "São Mateus",
    "Cascatinha",
    "Benfica",
    "Granbery",
    "Bom Pastor",
    "Costa Carvalho",
    "Santa Luzia",
    "Mariano Procópio",
    "Alto dos Passos",
    "São Pedro",
    "Paineiras",
    "Manoel Honório",
    "Bairu",
    "Santa Terezinha",
    "Barbosa Lage",
    "Industrial",
    "Linhares",
    "Poço Rico",
    "Outro",
];

pub async fn list() -> Json<Vec<&'static str>> {
    Json(NEIGHBORHOODS.to_vec())
}
