// stockpile_app/src/web/handlers/product_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use super::{parse_id, PageQuery};
use crate::errors::AppError;
use crate::state::AppState;
use stockpile::Product;

#[derive(Deserialize, Debug)]
pub struct StockUpdate {
  pub quantity: i32,
}

#[instrument(name = "handler::create_product", skip_all)]
pub async fn create_product_handler(
  app_state: web::Data<AppState>,
  body: web::Json<Product>,
) -> Result<HttpResponse, AppError> {
  let ctx = app_state.request_context();
  let product = app_state.products.create_product(&ctx, body.into_inner()).await?;
  Ok(HttpResponse::Created().json(product))
}

#[instrument(name = "handler::list_products", skip(app_state))]
pub async fn list_products_handler(
  app_state: web::Data<AppState>,
  query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
  let ctx = app_state.request_context();
  let products = app_state.products.list_products(&ctx).await?;
  let (products, pagination) = query.apply(products);
  info!(returned = products.len(), total = pagination.total, "Products listed.");
  Ok(HttpResponse::Ok().json(json!({
      "products": products,
      "pagination": pagination
  })))
}

#[instrument(name = "handler::get_product", skip(app_state, path), fields(product_id = %path.as_str()))]
pub async fn get_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let id = parse_id(&path, "product")?;
  let ctx = app_state.request_context();
  let product = app_state.products.get_product(&ctx, id).await?;
  Ok(HttpResponse::Ok().json(product))
}

#[instrument(name = "handler::update_product", skip(app_state, path, body), fields(product_id = %path.as_str()))]
pub async fn update_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  body: web::Json<Product>,
) -> Result<HttpResponse, AppError> {
  let id = parse_id(&path, "product")?;
  let mut product = body.into_inner();
  product.id = id;
  let ctx = app_state.request_context();
  let product = app_state.products.update_product(&ctx, product).await?;
  Ok(HttpResponse::Ok().json(product))
}

#[instrument(name = "handler::set_product_stock", skip(app_state, path, body), fields(product_id = %path.as_str()))]
pub async fn set_product_stock_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  body: web::Json<StockUpdate>,
) -> Result<HttpResponse, AppError> {
  let id = parse_id(&path, "product")?;
  let ctx = app_state.request_context();
  let product = app_state.products.set_product_stock(&ctx, id, body.quantity).await?;
  Ok(HttpResponse::Ok().json(product))
}

#[instrument(name = "handler::delete_product", skip(app_state, path), fields(product_id = %path.as_str()))]
pub async fn delete_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let id = parse_id(&path, "product")?;
  let ctx = app_state.request_context();
  app_state.products.delete_product(&ctx, id).await?;
  Ok(HttpResponse::Ok().json(json!({ "message": "Product deleted successfully" })))
}
