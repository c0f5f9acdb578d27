// stockpile_app/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{info, instrument};

use super::{parse_id, PageQuery};
use crate::errors::AppError;
use crate::state::AppState;
use stockpile::Order;

#[instrument(name = "handler::create_order", skip_all)]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  body: web::Json<Order>,
) -> Result<HttpResponse, AppError> {
  let ctx = app_state.request_context();
  let order = app_state.orders.create_order(&ctx, body.into_inner()).await?;
  Ok(HttpResponse::Created().json(order))
}

#[instrument(name = "handler::list_orders", skip(app_state))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
  let ctx = app_state.request_context();
  let orders = app_state.orders.list_orders(&ctx).await?;
  let (orders, pagination) = query.apply(orders);
  info!(returned = orders.len(), total = pagination.total, "Orders listed.");
  Ok(HttpResponse::Ok().json(json!({
      "orders": orders,
      "pagination": pagination
  })))
}

#[instrument(name = "handler::get_order", skip(app_state, path), fields(order_id = %path.as_str()))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let id = parse_id(&path, "order")?;
  let ctx = app_state.request_context();
  let order = app_state.orders.get_order(&ctx, id).await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::update_order", skip(app_state, path, body), fields(order_id = %path.as_str()))]
pub async fn update_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  body: web::Json<Order>,
) -> Result<HttpResponse, AppError> {
  let id = parse_id(&path, "order")?;
  let mut order = body.into_inner();
  order.id = id;
  let ctx = app_state.request_context();
  let order = app_state.orders.update_order(&ctx, order).await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::delete_order", skip(app_state, path), fields(order_id = %path.as_str()))]
pub async fn delete_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let id = parse_id(&path, "order")?;
  let ctx = app_state.request_context();
  app_state.orders.delete_order(&ctx, id).await?;
  Ok(HttpResponse::Ok().json(json!({ "message": "Order deleted successfully" })))
}
