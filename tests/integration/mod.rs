mod offers;
mod rollback;
mod scenarios;
