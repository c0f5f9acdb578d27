// tests/common/scenarios.rs

//! Behaviour every backend must show. Each scenario expects an empty store.

use stockpile::{ErrorKind, OpContext, OrderLine, StoreError, DEFAULT_ORDER_STATUS, MAX_ORDER_LINES, MAX_ORDER_STATUS_LEN};

use super::{assert_kind, order_of, widget, Fixture};

pub async fn product_create_then_get(fx: &Fixture) {
  let created = fx.products.create_product(&fx.ctx, widget()).await.unwrap();
  assert!(created.id > 0);
  assert_eq!(created.name, "Widget");
  assert_eq!(created.description.as_deref(), Some("A very ordinary widget"));
  assert_eq!(created.price, 500);
  assert_eq!(created.quantity, 10);

  let fetched = fx.products.get_product(&fx.ctx, created.id).await.unwrap();
  assert_eq!(fetched, created);
}

pub async fn widget_order_reserves_stock(fx: &Fixture) {
  let widget = fx.products.create_product(&fx.ctx, widget()).await.unwrap();
  assert_eq!(widget.id, 1);

  let order = fx.orders.create_order(&fx.ctx, order_of(42, &[(widget.id, 3)])).await.unwrap();
  assert_eq!(order.total, 1500);
  assert_eq!(order.lines.len(), 1);
  assert_eq!(order.lines[0].price, 500);
  assert_eq!(order.status, DEFAULT_ORDER_STATUS);
  assert_eq!(fx.stock_of(widget.id).await, 7);

  let fetched = fx.orders.get_order(&fx.ctx, order.id).await.unwrap();
  assert_eq!(fetched, order);
}

pub async fn order_for_missing_product_persists_nothing(fx: &Fixture) {
  let widget = fx.seed("Widget", 500, 10).await;
  let result = fx
    .orders
    .create_order(&fx.ctx, order_of(7, &[(widget.id, 1), (999, 1)]))
    .await;
  assert!(matches!(result, Err(StoreError::NotFound { id: 999, .. })));
  assert_eq!(fx.order_count().await, 0);
  assert_eq!(fx.stock_of(widget.id).await, 10);
}

pub async fn insufficient_stock_persists_nothing(fx: &Fixture) {
  let widget = fx.seed("Widget", 500, 10).await;
  let gadget = fx.seed("Gadget", 300, 5).await;

  let result = fx
    .orders
    .create_order(&fx.ctx, order_of(7, &[(gadget.id, 2), (widget.id, 11)]))
    .await;
  match result {
    Err(StoreError::InsufficientStock {
      product_id,
      available,
      requested,
    }) => {
      assert_eq!(product_id, widget.id);
      assert_eq!(available, 10);
      assert_eq!(requested, 11);
    }
    other => panic!("expected InsufficientStock, got {:?}", other),
  }

  // Lines for the same product are summed before the check.
  let split = fx
    .orders
    .create_order(&fx.ctx, order_of(7, &[(widget.id, 6), (widget.id, 5)]))
    .await;
  assert_kind(split, ErrorKind::InsufficientStock);

  assert_eq!(fx.order_count().await, 0);
  assert_eq!(fx.stock_of(widget.id).await, 10);
  assert_eq!(fx.stock_of(gadget.id).await, 5);
}

pub async fn updating_missing_records_is_not_found(fx: &Fixture) {
  let widget = fx.seed("Widget", 500, 10).await;

  let mut ghost = widget.clone();
  ghost.id = 999;
  assert_kind(fx.products.update_product(&fx.ctx, ghost).await, ErrorKind::NotFound);

  let mut order = order_of(1, &[(widget.id, 1)]);
  order.id = 999;
  assert_kind(fx.orders.update_order(&fx.ctx, order).await, ErrorKind::NotFound);

  assert_eq!(fx.products.get_product(&fx.ctx, widget.id).await.unwrap(), widget);
  assert_eq!(fx.order_count().await, 0);
}

pub async fn referenced_product_cannot_be_deleted(fx: &Fixture) {
  let widget = fx.seed("Widget", 500, 10).await;
  let order = fx.orders.create_order(&fx.ctx, order_of(3, &[(widget.id, 2)])).await.unwrap();

  assert_kind(fx.products.delete_product(&fx.ctx, widget.id).await, ErrorKind::Conflict);
  // The backend refuses too, without the service-level check.
  assert_kind(
    fx.storage.delete_product(&fx.ctx, widget.id).await,
    ErrorKind::Conflict,
  );

  fx.orders.delete_order(&fx.ctx, order.id).await.unwrap();
  fx.products.delete_product(&fx.ctx, widget.id).await.unwrap();
  assert_kind(fx.products.get_product(&fx.ctx, widget.id).await, ErrorKind::NotFound);
  assert_kind(fx.products.delete_product(&fx.ctx, widget.id).await, ErrorKind::NotFound);
}

pub async fn price_snapshot_survives_price_change_and_update(fx: &Fixture) {
  let widget = fx.seed("Widget", 500, 10).await;
  let gadget = fx.seed("Gadget", 300, 5).await;
  let order = fx.orders.create_order(&fx.ctx, order_of(9, &[(widget.id, 2)])).await.unwrap();
  assert_eq!(order.total, 1000);

  let mut repriced = fx.products.get_product(&fx.ctx, widget.id).await.unwrap();
  repriced.price = 900;
  fx.products.update_product(&fx.ctx, repriced).await.unwrap();

  let fetched = fx.orders.get_order(&fx.ctx, order.id).await.unwrap();
  assert_eq!(fetched.lines[0].price, 500);
  assert_eq!(fetched.total, 1000);

  let mut changed = order_of(9, &[(widget.id, 3), (gadget.id, 1)]);
  changed.id = order.id;
  let updated = fx.orders.update_order(&fx.ctx, changed).await.unwrap();
  assert_eq!(updated.lines[0].price, 500);
  assert_eq!(updated.lines[1].price, 300);
  assert_eq!(updated.total, 1800);
  assert_eq!(updated.created_at, order.created_at);
  assert_eq!(updated.status, DEFAULT_ORDER_STATUS);

  assert_eq!(fx.stock_of(widget.id).await, 7);
  assert_eq!(fx.stock_of(gadget.id).await, 4);
}

pub async fn order_changes_move_stock_both_ways(fx: &Fixture) {
  let widget = fx.seed("Widget", 500, 10).await;
  let gadget = fx.seed("Gadget", 300, 5).await;
  let order = fx
    .orders
    .create_order(&fx.ctx, order_of(5, &[(widget.id, 5)]).with_status("paid"))
    .await
    .unwrap();
  assert_eq!(order.status, "paid");
  assert_eq!(fx.stock_of(widget.id).await, 5);

  // Shrinking the order gives units back; a product that left the order
  // gets all of its units back.
  let mut smaller = order_of(5, &[(gadget.id, 2), (widget.id, 2)]).with_status("shipped");
  smaller.id = order.id;
  let updated = fx.orders.update_order(&fx.ctx, smaller).await.unwrap();
  assert_eq!(updated.status, "shipped");
  assert_eq!(fx.stock_of(widget.id).await, 8);
  assert_eq!(fx.stock_of(gadget.id).await, 3);

  // Growing past what is on hand fails and changes nothing.
  let mut greedy = order_of(5, &[(gadget.id, 6)]);
  greedy.id = order.id;
  assert_kind(fx.orders.update_order(&fx.ctx, greedy).await, ErrorKind::InsufficientStock);
  assert_eq!(fx.orders.get_order(&fx.ctx, order.id).await.unwrap(), updated);
  assert_eq!(fx.stock_of(gadget.id).await, 3);

  fx.orders.delete_order(&fx.ctx, order.id).await.unwrap();
  assert_eq!(fx.stock_of(widget.id).await, 10);
  assert_eq!(fx.stock_of(gadget.id).await, 5);
  assert_kind(fx.orders.get_order(&fx.ctx, order.id).await, ErrorKind::NotFound);
}

pub async fn listings_are_ordered_by_id(fx: &Fixture) {
  for (name, price) in [("Alpha", 100), ("Bravo", 200), ("Charlie", 300)] {
    fx.seed(name, price, 50).await;
  }
  let products = fx.products.list_products(&fx.ctx).await.unwrap();
  let ids: Vec<i64> = products.iter().map(|p| p.id).collect();
  assert_eq!(ids, vec![1, 2, 3]);

  for product_id in [3, 1, 2] {
    fx.orders
      .create_order(&fx.ctx, order_of(product_id, &[(product_id, 1), (1, 2)]))
      .await
      .unwrap();
  }
  let orders = fx.orders.list_orders(&fx.ctx).await.unwrap();
  assert_eq!(orders.iter().map(|o| o.id).collect::<Vec<_>>(), vec![1, 2, 3]);
  // Lines come back in the order they were written.
  assert_eq!(orders[0].lines[0].product_id, 3);
  assert_eq!(orders[0].lines[1].product_id, 1);
  assert_eq!(orders[0].total, 300 + 2 * 100);
}

pub async fn invalid_input_is_rejected_before_storage(fx: &Fixture) {
  let ctx = OpContext::background();
  let mut blank = widget();
  blank.name = "   ".to_string();
  assert_kind(fx.products.create_product(&ctx, blank).await, ErrorKind::ValidationFailed);

  let mut free = widget();
  free.price = 0;
  assert_kind(fx.products.create_product(&ctx, free).await, ErrorKind::ValidationFailed);

  assert_kind(fx.products.get_product(&ctx, 0).await, ErrorKind::ValidationFailed);
  assert_kind(fx.orders.get_order(&ctx, -4).await, ErrorKind::ValidationFailed);
  assert_kind(
    fx.orders.create_order(&ctx, order_of(1, &[])).await,
    ErrorKind::ValidationFailed,
  );
  assert_kind(
    fx.orders.create_order(&ctx, order_of(1, &[(1, 0)])).await,
    ErrorKind::ValidationFailed,
  );

  let widget = fx.seed("Widget", 500, 10).await;
  assert_kind(
    fx.products.set_product_stock(&ctx, widget.id, -1).await,
    ErrorKind::ValidationFailed,
  );
  let restocked = fx.products.set_product_stock(&ctx, widget.id, 40).await.unwrap();
  assert_eq!(restocked.quantity, 40);
  assert_eq!(fx.products.list_products(&ctx).await.unwrap().len(), 1);
}

pub async fn order_limits_hold_on_every_backend(fx: &Fixture) {
  let widget = fx.seed("Widget", 500, 10).await;

  let longest = "é".repeat(MAX_ORDER_STATUS_LEN);
  let order = fx
    .orders
    .create_order(&fx.ctx, order_of(1, &[(widget.id, 1)]).with_status(longest.clone()))
    .await
    .unwrap();
  assert_eq!(order.status, longest);

  let too_long = "x".repeat(MAX_ORDER_STATUS_LEN + 1);
  assert_kind(
    fx.orders
      .create_order(&fx.ctx, order_of(1, &[(widget.id, 1)]).with_status(too_long.clone()))
      .await,
    ErrorKind::ValidationFailed,
  );
  let mut renamed = order_of(1, &[(widget.id, 1)]).with_status(too_long);
  renamed.id = order.id;
  assert_kind(fx.orders.update_order(&fx.ctx, renamed).await, ErrorKind::ValidationFailed);

  let mut crowded = order_of(1, &[]);
  crowded.lines = vec![OrderLine::new(widget.id, 1); MAX_ORDER_LINES + 1];
  assert_kind(fx.orders.create_order(&fx.ctx, crowded).await, ErrorKind::ValidationFailed);

  assert_eq!(fx.orders.get_order(&fx.ctx, order.id).await.unwrap(), order);
  assert_eq!(fx.order_count().await, 1);
  assert_eq!(fx.stock_of(widget.id).await, 9);
}

/// Needs a multi-threaded runtime to interleave the changes.
pub async fn concurrent_changes_to_one_order_keep_stock_whole(fx: &Fixture) {
  let widget = fx.seed("Widget", 500, 10).await;
  let product_id = widget.id;
  let order = fx.orders.create_order(&fx.ctx, order_of(1, &[(product_id, 5)])).await.unwrap();
  let order_id = order.id;

  let mut handles = Vec::new();
  for quantity in [8, 2, 6, 1, 9, 4, 3, 7] {
    let orders = fx.orders.clone();
    let ctx = fx.ctx.clone();
    handles.push(tokio::spawn(async move {
      let mut changed = order_of(1, &[(product_id, quantity)]);
      changed.id = order_id;
      orders.update_order(&ctx, changed).await
    }));
  }
  for handle in handles {
    handle.await.unwrap().unwrap();
  }

  // Whatever change landed last, held plus on hand is what there was.
  let held = fx.orders.get_order(&fx.ctx, order_id).await.unwrap().lines[0].quantity;
  assert_eq!(fx.stock_of(product_id).await + held, 10);

  fx.orders.delete_order(&fx.ctx, order_id).await.unwrap();
  assert_eq!(fx.stock_of(product_id).await, 10);
}
