


pub const APP_NAME: &str = "Redeem";
pub type PanelHttpResponse = Result<actix_web::HttpResponse, actix_web::Error>;


pub static REDEEM_REQUESTED: &str = "Redeem Requested Successfully";
pub static BONUS_CLAIMED: &str = "Daily Bonus Claimed Successfully";
pub static DEPOSITED_SUCCESSFULLY: &str = "Deposited Successfully";
pub static ALREADY_CLAIMED_TODAY: &str = "Daily Bonus Is Already Claimed Today, Come Back Tomorrow";
pub static INVALID_AMOUNT: &str = "Amount Can't Be Negative";
pub static FETCHED: &str = "Fetched Successfully";
pub static USER_NOT_FOUND: &str = "User Not Found";
pub static NOT_AUTH_HEADER: &str = "No Authorization Header Is Provided";
pub static STORAGE_ISSUE: &str = "Storage Is Not Available, Try Again Later";
pub static MALFORMED_LEDGER: &str = "Ledger Contains A Malformed Record";
pub static IAM_HEALTHY: &str = "Ok";
