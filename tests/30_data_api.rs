mod common;

use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::sync::OnceCell;

const ADMIN_EMAIL: &str = "tests-admin@example.com";
const ADMIN_PASSWORD: &str = "tests-admin-senha";

static ADMIN_TOKEN: OnceCell<Option<String>> = OnceCell::const_new();

/// Migrates, seeds an admin through the CLI and logs in.
/// `None` when the server has no database to talk to.
async fn admin_token() -> Result<Option<String>> {
    let token = ADMIN_TOKEN
        .get_or_try_init(|| async {
            let server = common::ensure_server().await?;
            let health = reqwest::get(format!("{}/health", server.base_url)).await?;
            if health.status() != StatusCode::OK {
                eprintln!("skipping data API tests: database not reachable");
                return Ok::<_, anyhow::Error>(None);
            }

            cli(&["migrate"])?;
            cli(&["seed", "--admin-email", ADMIN_EMAIL, "--admin-password", ADMIN_PASSWORD])?;
            cli(&["user", "set-password", "--email", ADMIN_EMAIL, "--password", ADMIN_PASSWORD])?;

            let res = Client::new()
                .post(format!("{}/auth/login", server.base_url))
                .json(&json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
                .send()
                .await?;
            let body = expect(res, StatusCode::OK).await?;
            let token = body["data"]["token"].as_str().context("login without token")?;
            Ok(Some(token.to_string()))
        })
        .await?;
    Ok(token.clone())
}

fn cli(args: &[&str]) -> Result<()> {
    let status = Command::new(env!("CARGO_BIN_EXE_backoffice"))
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .status()
        .with_context(|| format!("failed to run backoffice {:?}", args))?;
    if !status.success() {
        bail!("backoffice {:?} exited with {}", args, status);
    }
    Ok(())
}

async fn expect(res: reqwest::Response, status: StatusCode) -> Result<Value> {
    let actual = res.status();
    let body = if actual == StatusCode::NO_CONTENT {
        Value::Null
    } else {
        res.json::<Value>().await?
    };
    assert_eq!(actual, status, "unexpected status, body: {}", body);
    Ok(body)
}

/// Decimals serialize as strings
fn num(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().unwrap_or(f64::NAN),
        other => other.as_f64().unwrap_or(f64::NAN),
    }
}

fn tag() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

struct Api {
    client: Client,
    base_url: String,
    token: String,
}

impl Api {
    async fn connect() -> Result<Option<Self>> {
        let Some(token) = admin_token().await? else {
            return Ok(None);
        };
        let server = common::ensure_server().await?;
        Ok(Some(Self {
            client: Client::new(),
            base_url: server.base_url.clone(),
            token,
        }))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    async fn get(&self, path: &str, status: StatusCode) -> Result<Value> {
        expect(self.request(reqwest::Method::GET, path).send().await?, status).await
    }

    async fn post(&self, path: &str, body: Value, status: StatusCode) -> Result<Value> {
        expect(self.request(reqwest::Method::POST, path).json(&body).send().await?, status).await
    }

    async fn put(&self, path: &str, body: Value, status: StatusCode) -> Result<Value> {
        expect(self.request(reqwest::Method::PUT, path).json(&body).send().await?, status).await
    }

    async fn delete(&self, path: &str, status: StatusCode) -> Result<Value> {
        expect(self.request(reqwest::Method::DELETE, path).send().await?, status).await
    }
}

#[tokio::test]
async fn clients_round_trip_and_batch_delete() -> Result<()> {
    let Some(api) = Api::connect().await? else {
        return Ok(());
    };
    let tag = tag();

    let created = api
        .post(
            "/api/clients",
            json!({ "name": format!("Cliente {}", tag), "city": "Uberaba", "state": "mg" }),
            StatusCode::CREATED,
        )
        .await?;
    let id = created["data"]["id"].as_str().context("client id")?.to_string();
    assert_eq!(created["data"]["state"], "MG");

    let fetched = api.get(&format!("/api/clients/{}", id), StatusCode::OK).await?;
    assert_eq!(fetched["data"]["name"], format!("Cliente {}", tag));

    let updated = api
        .put(
            &format!("/api/clients/{}", id),
            json!({ "name": format!("Cliente {} Ltda", tag), "state": "SP" }),
            StatusCode::OK,
        )
        .await?;
    assert_eq!(updated["data"]["state"], "SP");

    let listed = api.get(&format!("/api/clients?search={}", tag), StatusCode::OK).await?;
    assert_eq!(listed["data"]["total"], 1, "{}", listed);
    assert_eq!(listed["data"]["items"][0]["id"], id.as_str());

    let second = api
        .post("/api/clients", json!({ "name": format!("Outro {}", tag) }), StatusCode::CREATED)
        .await?;
    let ids = json!({ "ids": [id, second["data"]["id"], uuid::Uuid::new_v4()] });
    let deleted = api.post("/api/clients/batch-delete", ids, StatusCode::OK).await?;
    assert_eq!(deleted["data"]["deleted"], 2);

    api.get(&format!("/api/clients/{}", id), StatusCode::NOT_FOUND).await?;
    Ok(())
}

#[tokio::test]
async fn budget_items_keep_the_projection_in_sync() -> Result<()> {
    let Some(api) = Api::connect().await? else {
        return Ok(());
    };
    let year = rand::thread_rng().gen_range(2000..=2049);
    let other_year = year + 50;

    let revenue = |view: &Value| num(&view["data"]["annual"]["revenue"]);
    let march = |view: &Value| num(&view["data"]["revenue"][2]);

    let before = api.get(&format!("/api/projection/{}", year), StatusCode::OK).await?;
    let before_other = api.get(&format!("/api/projection/{}", other_year), StatusCode::OK).await?;

    let mut values = vec![json!(0); 12];
    values[2] = json!("1500.25");
    values[11] = json!(100);
    let item = api
        .post(
            "/api/projection/items",
            json!({ "year": year, "category": "receitas", "name": format!("Contrato {}", tag()), "values": values }),
            StatusCode::CREATED,
        )
        .await?;
    let item_id = item["data"]["id"].as_str().context("item id")?.to_string();

    let after = api.get(&format!("/api/projection/{}", year), StatusCode::OK).await?;
    assert!((revenue(&after) - revenue(&before) - 1600.25).abs() < 0.001, "{}", after);
    assert!((march(&after) - march(&before) - 1500.25).abs() < 0.001, "{}", after);

    // Moving the item leaves the old year as it was and credits the new one
    api.put(
        &format!("/api/projection/items/{}", item_id),
        json!({ "year": other_year, "category": "receitas", "name": "Contrato movido", "values": values }),
        StatusCode::OK,
    )
    .await?;
    let moved_from = api.get(&format!("/api/projection/{}", year), StatusCode::OK).await?;
    let moved_to = api.get(&format!("/api/projection/{}", other_year), StatusCode::OK).await?;
    assert!((revenue(&moved_from) - revenue(&before)).abs() < 0.001, "{}", moved_from);
    assert!((revenue(&moved_to) - revenue(&before_other) - 1600.25).abs() < 0.001, "{}", moved_to);

    let synced = api
        .post(&format!("/api/projection/{}/sync", other_year), json!({}), StatusCode::OK)
        .await?;
    assert_eq!(synced["data"]["annual"], moved_to["data"]["annual"]);

    let mut oversized = vec![json!(0); 12];
    oversized[0] = json!("1000000000000");
    // Rejected while deserializing the body, before any write
    let res = api
        .request(reqwest::Method::POST, "/api/projection/items")
        .json(&json!({ "year": year, "category": "receitas", "name": "Grande", "values": oversized }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    api.delete(&format!("/api/projection/items/{}", item_id), StatusCode::NO_CONTENT)
        .await?;
    let cleared = api.get(&format!("/api/projection/{}", other_year), StatusCode::OK).await?;
    assert!((revenue(&cleared) - revenue(&before_other)).abs() < 0.001, "{}", cleared);
    Ok(())
}

#[tokio::test]
async fn unknown_module_leaves_permissions_untouched() -> Result<()> {
    let Some(api) = Api::connect().await? else {
        return Ok(());
    };
    let email = format!("permissoes-{}@example.com", tag());
    let created = api
        .post(
            "/api/admin/users",
            json!({ "name": "Permissões", "email": email, "password": "senha-segura-1" }),
            StatusCode::CREATED,
        )
        .await?;
    let id = created["data"]["id"].as_str().context("user id")?.to_string();
    let path = format!("/api/admin/users/{}/permissions", id);

    let granted = api
        .put(&path, json!({ "clientes": "edit", "dashboard": "view" }), StatusCode::OK)
        .await?;
    assert_eq!(granted["data"], json!({ "clientes": "edit", "dashboard": "view" }));

    let rejected = api
        .put(&path, json!({ "transacoes": "edit", "financeiro": "view" }), StatusCode::BAD_REQUEST)
        .await?;
    assert_eq!(rejected["success"], false);

    let stored = api.get(&path, StatusCode::OK).await?;
    assert_eq!(stored["data"], granted["data"]);

    api.delete(&format!("/api/admin/users/{}", id), StatusCode::NO_CONTENT).await?;
    Ok(())
}

#[tokio::test]
async fn share_links_filter_count_and_deny() -> Result<()> {
    let Some(api) = Api::connect().await? else {
        return Ok(());
    };
    let tag = tag();
    let property = |name: &str, status: &str| {
        json!({
            "property_name": format!("{} {}", name, tag),
            "municipality": "Uberaba",
            "state": "MG",
            "total_area_ha": "100",
            "native_vegetation_ha": "20",
            "certification_status": status,
        })
    };

    let mut ids = Vec::new();
    for (name, status) in [("Fazenda A", "certificado"), ("Fazenda B", "pendente"), ("Fazenda C", "certificado")] {
        let created = api.post("/api/acompanhamentos", property(name, status), StatusCode::CREATED).await?;
        ids.push(created["data"]["id"].as_str().context("acompanhamento id")?.to_string());
    }

    // Record ids and filters narrow together: A and B selected, only A certified
    let link = api
        .post(
            "/api/share-links",
            json!({
                "label": format!("Auditoria {}", tag),
                "password": "senha-do-link",
                "record_ids": [ids[0], ids[1]],
                "filter": { "status": "certificado", "municipality": "uberaba" },
                "visible_fields": ["property_name", "certification_status"],
            }),
            StatusCode::CREATED,
        )
        .await?;
    let link_id = link["data"]["id"].as_str().context("link id")?.to_string();
    let token = link["data"]["token"].as_str().context("link token")?.to_string();
    let share_url = format!("{}/share/{}", api.base_url, token);

    let missing = expect(api.client.get(&share_url).send().await?, StatusCode::UNAUTHORIZED).await?;
    assert_eq!(missing["code"], "SHARE_PASSWORD_REQUIRED");

    let wrong = api.client.post(&share_url).json(&json!({ "password": "errada" })).send().await?;
    let wrong = expect(wrong, StatusCode::UNAUTHORIZED).await?;
    assert_eq!(wrong["code"], "SHARE_PASSWORD_INVALID");

    for _ in 0..2 {
        let ok = api.client.post(&share_url).json(&json!({ "password": "senha-do-link" })).send().await?;
        let ok = expect(ok, StatusCode::OK).await?;
        assert_eq!(ok["data"]["total"], 1, "{}", ok);
        let record = &ok["data"]["records"][0];
        assert_eq!(record["id"], ids[0].as_str());
        assert!(record.get("notes").is_none(), "{}", record);
    }

    let links = api.get("/api/share-links", StatusCode::OK).await?;
    let listed = links["data"]
        .as_array()
        .and_then(|all| all.iter().find(|l| l["id"] == link_id.as_str()))
        .context("link missing from list")?;
    assert_eq!(listed["access_count"], 2, "denied attempts are not counted");

    // Short-lived link answers 410 once it lapses
    let expires_at = chrono::Utc::now() + chrono::Duration::seconds(2);
    let short = api
        .post(
            "/api/share-links",
            json!({ "label": format!("Curto {}", tag), "expires_at": expires_at }),
            StatusCode::CREATED,
        )
        .await?;
    let short_url = format!("{}/share/{}", api.base_url, short["data"]["token"].as_str().context("token")?);
    tokio::time::sleep(Duration::from_secs(3)).await;
    let gone = expect(api.client.get(&short_url).send().await?, StatusCode::GONE).await?;
    assert_eq!(gone["code"], "GONE");

    api.delete(&format!("/api/share-links/{}", link_id), StatusCode::NO_CONTENT).await?;
    expect(api.client.get(&share_url).send().await?, StatusCode::NOT_FOUND).await?;

    api.post("/api/acompanhamentos/batch-delete", json!({ "ids": ids }), StatusCode::OK)
        .await?;
    Ok(())
}

#[tokio::test]
async fn oversized_import_row_fails_alone() -> Result<()> {
    let Some(api) = Api::connect().await? else {
        return Ok(());
    };
    let tag = tag();
    let csv = format!(
        "tipo,descricao,valor,data\nreceita,Consultoria {tag},150.00,2024-03-10\nreceita,Contrato {tag},10000000000000,2024-03-11\n"
    );
    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(csv.into_bytes())
            .file_name("lancamentos.csv")
            .mime_str("text/csv")?,
    );

    let res = api
        .request(reqwest::Method::POST, "/api/transactions/import")
        .multipart(form)
        .send()
        .await?;
    let report = expect(res, StatusCode::OK).await?;
    assert_eq!(report["data"]["imported"], 1, "{}", report);
    assert_eq!(report["data"]["failed"].as_array().map(Vec::len), Some(1), "{}", report);

    let listed = api.get(&format!("/api/transactions?search={}", tag), StatusCode::OK).await?;
    assert_eq!(listed["data"]["total"], 1, "{}", listed);
    let id = listed["data"]["items"][0]["id"].clone();
    api.post("/api/transactions/batch-delete", json!({ "ids": [id] }), StatusCode::OK)
        .await?;
    Ok(())
}

#[tokio::test]
async fn summary_rejects_out_of_range_years() -> Result<()> {
    let Some(api) = Api::connect().await? else {
        return Ok(());
    };
    for year in ["0", "2147483647"] {
        let body = api
            .get(&format!("/api/transactions/summary?year={}", year), StatusCode::BAD_REQUEST)
            .await?;
        assert_eq!(body["code"], "VALIDATION_ERROR", "{}", body);
    }
    api.get("/api/transactions/summary?year=2024", StatusCode::OK).await?;
    Ok(())
}
