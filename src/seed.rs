//! Sample rows written into empty collections the first time a store opens.

use serde_json::json;

use crate::local_db_model::{Collection, Record};

/// Collections that receive sample rows. `workers` and `attendance` start empty.
pub const SEEDED: [Collection; 3] = [Collection::Storage, Collection::Sales, Collection::Expenses];

pub fn seed_rows(collection: Collection) -> Vec<Record> {
    let rows = match collection {
        Collection::Storage => json!([
            {
                "id": 1,
                "itemName": "الجبس",
                "quantityInTons": 150,
                "purchasePricePerTon": 120,
                "dealerName": "شركة المعادن المتقدمة",
                "dealerContact": "01234567890",
                "purchaseDate": "2024-01-15"
            },
            {
                "id": 2,
                "itemName": "الفلسبار",
                "quantityInTons": 200,
                "purchasePricePerTon": 180,
                "dealerName": "مؤسسة الصخور المعدنية",
                "dealerContact": "01987654321",
                "purchaseDate": "2024-01-20"
            }
        ]),
        Collection::Sales => json!([
            {
                "id": 1,
                "productName": "Ammonium Nitrate",
                "quantity": 500,
                "unitPrice": 180,
                "totalPrice": 90000,
                "customerName": "Green Fields Co.",
                "date": "2024-01-10",
                "status": "completed"
            }
        ]),
        Collection::Expenses => json!([
            {
                "id": 1,
                "name": "Electricity Bill",
                "amount": 15000,
                "category": "utilities",
                "date": "2024-01-01"
            }
        ]),
        Collection::Workers | Collection::Attendance => json!([]),
    };

    serde_json::from_value(rows).unwrap_or_default()
}
