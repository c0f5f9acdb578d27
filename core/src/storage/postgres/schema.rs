// stockpile/src/storage/postgres/schema.rs

//! Table definitions. This is the only on-disk contract the store owns.
//!
//! Every statement is idempotent; there is no migration history.

pub(crate) const STATEMENTS: &[&str] = &[
  r#"
  CREATE TABLE IF NOT EXISTS products (
    id          BIGSERIAL PRIMARY KEY,
    name        VARCHAR(100) NOT NULL CHECK (btrim(name) <> ''),
    description TEXT,
    price       BIGINT NOT NULL CHECK (price > 0),
    quantity    INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
  )
  "#,
  r#"
  CREATE TABLE IF NOT EXISTS orders (
    id          BIGSERIAL PRIMARY KEY,
    user_id     BIGINT NOT NULL CHECK (user_id > 0),
    status      VARCHAR(50) NOT NULL,
    total       BIGINT NOT NULL DEFAULT 0,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
  )
  "#,
  // Lines go with their order; a product cannot go while lines point at it.
  r#"
  CREATE TABLE IF NOT EXISTS order_lines (
    id          BIGSERIAL PRIMARY KEY,
    order_id    BIGINT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
    product_id  BIGINT NOT NULL REFERENCES products(id),
    line_no     INTEGER NOT NULL,
    quantity    INTEGER NOT NULL CHECK (quantity > 0),
    price       BIGINT NOT NULL,
    UNIQUE (order_id, line_no)
  )
  "#,
  "CREATE INDEX IF NOT EXISTS order_lines_product_id_idx ON order_lines (product_id)",
];
